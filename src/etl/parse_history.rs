use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str;

use chrono::DateTime;
use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::ImporterConfig;
use crate::data::OsmHistory;
use crate::data::osm::{Member, MemberType, Node, OsmId, Relation, Tags, Timestamp, Way};
use crate::errors::{Error, Result};
use crate::etl::Etl;

pub const ETL_NAME: &str = "parse_history";
pub const OUTPUT_FILE_NAME: &str = "history.rkyv";

enum ParserState {
    Top,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

/// Attributes shared by `<node>`, `<way>` and `<relation>`.
struct Header {
    id: OsmId,
    version: u32,
    timestamp: Timestamp,
    visible: bool,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn attribute_str<'a>(value: &'a [u8]) -> Result<&'a str> {
    Ok(str::from_utf8(value)?)
}

fn parse_timestamp(value: &str) -> Result<Timestamp> {
    Ok(DateTime::parse_from_rfc3339(value)?.timestamp())
}

fn parse_header(el: &BytesStart) -> Result<Header> {
    let mut id: Option<OsmId> = None;
    let mut version: Option<u32> = None;
    let mut timestamp: Option<Timestamp> = None;
    let mut visible = true;
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        match attribute.key.as_ref() {
            b"id" => id = Some(attribute_str(&attribute.value)?.parse()?),
            b"version" => version = Some(attribute_str(&attribute.value)?.parse()?),
            b"timestamp" => timestamp = Some(parse_timestamp(attribute_str(&attribute.value)?)?),
            b"visible" => visible = &*attribute.value != b"false",
            b"lat" => lat = Some(attribute_str(&attribute.value)?.parse()?),
            b"lon" => lon = Some(attribute_str(&attribute.value)?.parse()?),
            // changeset, uid, user
            _ => (),
        }
    }

    let element = String::from_utf8_lossy(el.name().as_ref()).into_owned();
    Ok(Header {
        id: id.ok_or_else(|| format!("{} without id", element))?,
        version: version.ok_or_else(|| format!("{} without version", element))?,
        timestamp: timestamp.ok_or_else(|| format!("{} without timestamp", element))?,
        visible,
        lat,
        lon,
    })
}

fn parse_node(el: &BytesStart) -> Result<Node> {
    let header = parse_header(el)?;
    // deleted versions carry no location
    let (lon, lat) = match (header.lon, header.lat) {
        (Some(lon), Some(lat)) => (lon, lat),
        _ if !header.visible => (0.0, 0.0),
        _ => return Err(format!("visible node {} without location", header.id).into()),
    };
    Ok(Node {
        id: header.id,
        version: header.version,
        timestamp: header.timestamp,
        visible: header.visible,
        lon,
        lat,
        tags: Tags::new(),
    })
}

fn parse_way(el: &BytesStart) -> Result<Way> {
    let header = parse_header(el)?;
    Ok(Way {
        id: header.id,
        version: header.version,
        timestamp: header.timestamp,
        visible: header.visible,
        node_refs: Vec::new(),
        tags: Tags::new(),
    })
}

fn parse_relation(el: &BytesStart) -> Result<Relation> {
    let header = parse_header(el)?;
    Ok(Relation {
        id: header.id,
        version: header.version,
        timestamp: header.timestamp,
        visible: header.visible,
        members: Vec::new(),
        tags: Tags::new(),
    })
}

fn parse_tag(el: &BytesStart) -> Result<(String, String)> {
    let mut key: Option<String> = None;
    let mut value: Option<String> = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        match attribute.key.as_ref() {
            b"k" => key = Some(attribute.unescape_value()?.into_owned()),
            b"v" => value = Some(attribute.unescape_value()?.into_owned()),
            _ => (),
        }
    }
    Ok((key.ok_or("tag without key")?, value.unwrap_or_default()))
}

fn parse_ref(el: &BytesStart) -> Result<OsmId> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == b"ref" {
            return Ok(attribute_str(&attribute.value)?.parse()?);
        }
    }
    Err("nd without ref".into())
}

fn parse_member(el: &BytesStart) -> Result<Member> {
    let mut member_type: Option<MemberType> = None;
    let mut reference: Option<OsmId> = None;
    let mut role = String::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        match attribute.key.as_ref() {
            b"type" => member_type = MemberType::from_xml(&attribute.value),
            b"ref" => reference = Some(attribute_str(&attribute.value)?.parse()?),
            b"role" => role = attribute.unescape_value()?.into_owned(),
            _ => (),
        }
    }
    Ok(Member {
        member_type: member_type.ok_or("member without valid type")?,
        reference: reference.ok_or("member without ref")?,
        role,
    })
}

fn finish(history: &mut OsmHistory, state: ParserState) {
    match state {
        ParserState::Top => (),
        ParserState::Node(node) => history.nodes.push(node),
        ParserState::Way(way) => history.ways.push(way),
        ParserState::Relation(relation) => history.relations.push(relation),
    }
}

fn add_child(state: &mut ParserState, el: &BytesStart) -> Result<()> {
    match el.name().as_ref() {
        b"tag" => {
            let (key, value) = parse_tag(el)?;
            match state {
                ParserState::Node(node) => node.tags.insert(key, value),
                ParserState::Way(way) => way.tags.insert(key, value),
                ParserState::Relation(relation) => relation.tags.insert(key, value),
                ParserState::Top => return Err("tag outside of an entity".into()),
            };
        },
        b"nd" => match state {
            ParserState::Way(way) => way.node_refs.push(parse_ref(el)?),
            _ => return Err("nd outside of a way".into()),
        },
        b"member" => match state {
            ParserState::Relation(relation) => relation.members.push(parse_member(el)?),
            _ => return Err("member outside of a relation".into()),
        },
        // osm, osmChange, create/modify/delete, bounds
        _ => (),
    }
    Ok(())
}

/// Read a complete OSM (history) XML document. Versions end up grouped by id, oldest first.
pub fn read_history<R: BufRead>(reader: &mut Reader<R>) -> Result<OsmHistory> {
    let mut buf = Vec::new();
    let mut history = OsmHistory::default();
    let mut state = ParserState::Top;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(e.into()),
            Ok(Event::Eof) => break,
            Ok(Event::Text(_e)) => return Err("Didn't expect to see Text in OSM file.".into()),
            Ok(Event::Start(e)) => {
                match e.name().as_ref() {
                    b"node" => state = ParserState::Node(parse_node(&e)?),
                    b"way" => state = ParserState::Way(parse_way(&e)?),
                    b"relation" => state = ParserState::Relation(parse_relation(&e)?),
                    _ => add_child(&mut state, &e)?,
                }
            },
            Ok(Event::End(e)) => {
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    finish(&mut history, std::mem::replace(&mut state, ParserState::Top));
                }
            },
            Ok(Event::Empty(e)) => {
                match e.name().as_ref() {
                    b"node" => history.nodes.push(parse_node(&e)?),
                    b"way" => history.ways.push(parse_way(&e)?),
                    b"relation" => history.relations.push(parse_relation(&e)?),
                    _ => add_child(&mut state, &e)?,
                }
            },
            // declarations, comments, processing instructions
            Ok(_) => (),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    }

    // the tracker relies on all versions of one entity being adjacent
    history.nodes.sort_by_key(|n| (n.id, n.version));
    history.ways.sort_by_key(|w| (w.id, w.version));
    history.relations.sort_by_key(|r| (r.id, r.version));
    Ok(history)
}

pub struct ParseHistoryEtl<'a> {
    config: &'a ImporterConfig,
}

impl ParseHistoryEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn create_osm_reader(&self) -> Result<Reader<Box<dyn BufRead>>> {
        let path = Path::new(&self.config.data_path);
        let file_reader = BufReader::new(File::open(path)?);
        let input: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        Ok(reader)
    }

    pub fn new(config: &ImporterConfig) -> ParseHistoryEtl {
        ParseHistoryEtl {
            config
        }
    }
}

impl Etl for ParseHistoryEtl<'_> {
    type Input = Reader<Box<dyn BufRead>>;
    type Output = OsmHistory;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        fs::remove_file(Self::output_path(dir))?;
        Ok(())
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        self.create_osm_reader()
    }

    fn transform(&mut self, mut input: Self::Input) -> Result<Self::Output> {
        let history = read_history(&mut input)?;
        if history.nodes.is_empty() && history.ways.is_empty() && history.relations.is_empty() {
            warn!(data_path = self.config.data_path.as_str(); "Input contains no entities");
        }
        info!(
            nodes = history.nodes.len(),
            ways = history.ways.len(),
            relations = history.relations.len();
            "Parsed history"
        );
        Ok(history)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let bytes = rkyv::to_bytes::<_, 256>(&output)
            .map_err(|e| Error::from(format!("Could not serialize history: {:?}", e)))?;
        let mut output_file = File::create(Self::output_path(dir))?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}

/// Read the history cached by [`ParseHistoryEtl`].
pub fn read_cached_history(dir: &Path) -> Result<OsmHistory> {
    let bytes = fs::read(dir.join(OUTPUT_FILE_NAME))?;
    let mut aligned = rkyv::AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(&bytes);
    // written by `ParseHistoryEtl::load` with the same type layout
    let history: OsmHistory = unsafe {
        rkyv::from_bytes_unchecked(&aligned)
            .map_err(|e| Error::from(format!("Could not deserialize history: {:?}", e)))?
    };
    Ok(history)
}
