use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::ImporterConfig;
use crate::classify::looks_like_polygon;
use crate::data::OsmHistory;
use crate::data::osm::{Entity, Node, OsmId, Timestamp, Way};
use crate::errors::Result;
use crate::etl::Etl;
use crate::etl::parse_history;
use crate::geom_builder::{GeomBuilder, GeomBuilderConfig};
use crate::nodestore::{CoordinateStore, MemoryNodestore};
use crate::project::{Projection, SphericalMercator};
use crate::tracker::{EntityTracker, TrackerError};

pub const ETL_NAME: &str = "build_geometries";
pub const OUTPUT_FILE_NAME: &str = "way_geometries.jsonl";

/// One row per time interval in which a way version kept the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRow {
    pub way_id: OsmId,
    pub version: u32,
    /// 0 for the way's own edit, then one per change of a referenced node.
    pub minor: u32,
    pub valid_from: Timestamp,
    pub valid_to: Option<Timestamp>,
    pub srid: i32,
    pub kind: String,
    pub ewkt: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub node_versions: usize,
    pub way_versions: usize,
    pub deleted_ways: usize,
    pub geometries: usize,
    pub failed_geometries: usize,
    pub relations: usize,
}

pub struct Output {
    pub rows: Vec<GeometryRow>,
    pub stats: BuildStats,
}

/// Feed `entities` through a tracker and call `on_current` once per entity, at the point where
/// it is current and its successor (if any) is staged as next.
pub fn track<T, F>(entities: &[T], mut on_current: F) -> std::result::Result<(), TrackerError>
where
    T: Entity + Clone,
    F: FnMut(&EntityTracker<T>),
{
    let mut tracker = EntityTracker::new();
    for entity in entities {
        tracker.feed(entity)?;
        if tracker.has_current() {
            on_current(&tracker);
        }
        tracker.swap();
    }
    if tracker.has_current() {
        on_current(&tracker);
    }
    Ok(())
}

/// Load every visible node version into a nodestore, valid until its next version.
pub fn build_nodestore(nodes: &[Node]) -> std::result::Result<MemoryNodestore, TrackerError> {
    let mut store = MemoryNodestore::new();
    track(nodes, |tracker| {
        let Some(node) = tracker.current() else {
            return;
        };
        if node.visible {
            store.record(node.id, node.timestamp, tracker.valid_to(), node.lon, node.lat);
        }
    })?;
    Ok(store)
}

/// Starts of the intervals in which `way` keeps one shape, from its own timestamp up to
/// `valid_to`.
pub fn minor_versions(
    way: &Way,
    valid_to: Option<Timestamp>,
    nodestore: &MemoryNodestore,
) -> Vec<Timestamp> {
    let mut starts = vec![way.timestamp];
    for &node_id in &way.node_refs {
        starts.extend(nodestore.changes_between(node_id, way.timestamp, valid_to));
    }
    starts.sort_unstable();
    starts.dedup();
    starts
}

/// Build one row per minor version of every visible way version.
pub fn build_way_rows<S, P>(
    ways: &[Way],
    nodestore: &MemoryNodestore,
    builder: &GeomBuilder<'_, S, P>,
    stats: &mut BuildStats,
) -> std::result::Result<Vec<GeometryRow>, TrackerError>
where
    S: CoordinateStore,
    P: Projection,
{
    let mut rows = Vec::new();
    track(ways, |tracker| {
        let Some(way) = tracker.current() else {
            return;
        };
        stats.way_versions += 1;

        if !way.visible {
            stats.deleted_ways += 1;
            if let Some(previous) = tracker.previous().filter(|_| tracker.previous_is_same_entity()) {
                debug!(
                    way_id = way.id,
                    version = way.version,
                    was_area = looks_like_polygon(&previous.tags);
                    "Way deleted"
                );
            }
            return;
        }

        let valid_to = tracker.valid_to();
        let polygon_hint = looks_like_polygon(&way.tags);
        let starts = minor_versions(way, valid_to, nodestore);

        for (minor, &start) in starts.iter().enumerate() {
            let end = starts.get(minor + 1).copied().or(valid_to);
            // superseded within the same second
            if end == Some(start) {
                continue;
            }
            match builder.for_way(&way.node_refs, start, polygon_hint) {
                Ok(geometry) => {
                    stats.geometries += 1;
                    rows.push(GeometryRow {
                        way_id: way.id,
                        version: way.version,
                        minor: minor as u32,
                        valid_from: start,
                        valid_to: end,
                        srid: geometry.srid,
                        kind: geometry.kind().to_string(),
                        ewkt: geometry.to_ewkt(),
                    });
                },
                Err(_) => stats.failed_geometries += 1,
            }
        }
    })?;
    Ok(rows)
}

pub struct BuildGeometriesEtl<'a> {
    config: &'a ImporterConfig,
}

impl BuildGeometriesEtl<'_> {
    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn new(config: &ImporterConfig) -> BuildGeometriesEtl {
        BuildGeometriesEtl {
            config
        }
    }

    fn builder_config(&self) -> GeomBuilderConfig {
        self.config.builder_config()
    }
}

impl Etl for BuildGeometriesEtl<'_> {
    type Input = OsmHistory;
    type Output = Output;

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

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        parse_history::read_cached_history(dir)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let mut stats = BuildStats {
            node_versions: input.nodes.len(),
            ..Default::default()
        };

        let nodestore = build_nodestore(&input.nodes)?;
        info!(etl_name = ETL_NAME, nodes = nodestore.len(); "Filled nodestore");

        let builder = GeomBuilder::new(&nodestore, &SphericalMercator, self.builder_config());
        let rows = build_way_rows(&input.ways, &nodestore, &builder, &mut stats)?;

        track(&input.relations, |tracker| {
            if !tracker.previous_is_same_entity() {
                stats.relations += 1;
            }
        })?;

        Ok(Output { rows, stats })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut writer = BufWriter::new(File::create(Self::output_path(dir))?);
        for row in &output.rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        let stats = output.stats;
        info!(
            etl_name = ETL_NAME,
            node_versions = stats.node_versions,
            way_versions = stats.way_versions,
            deleted_ways = stats.deleted_ways,
            geometries = stats.geometries,
            failed_geometries = stats.failed_geometries,
            relations = stats.relations;
            "Wrote way geometries"
        );
        Ok(())
    }
}
