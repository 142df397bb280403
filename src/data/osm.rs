use std::collections::HashMap;

pub type OsmId = i64;

/// Seconds since the unix epoch, UTC.
pub type Timestamp = i64;

pub type Tags = HashMap<String, String>;

/// Anything the tracker can keep in its window. Every version of one entity shares its `id`.
pub trait Entity {
    fn id(&self) -> OsmId;
    fn version(&self) -> u32;
    fn timestamp(&self) -> Timestamp;
    fn visible(&self) -> bool;
    fn tags(&self) -> &Tags;
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub version: u32,
    pub timestamp: Timestamp,
    pub visible: bool,
    pub lon: f64,
    pub lat: f64,
    pub tags: Tags,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    pub version: u32,
    pub timestamp: Timestamp,
    pub visible: bool,
    /// Order and duplicates matter, a closed ring repeats its first reference at the end.
    pub node_refs: Vec<OsmId>,
    pub tags: Tags,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Member {
    pub member_type: MemberType,
    pub reference: OsmId,
    pub role: String,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    pub version: u32,
    pub timestamp: Timestamp,
    pub visible: bool,
    pub members: Vec<Member>,
    pub tags: Tags,
}

macro_rules! impl_entity {
    ($($ty:ty),*) => {
        $(
            impl Entity for $ty {
                fn id(&self) -> OsmId {
                    self.id
                }

                fn version(&self) -> u32 {
                    self.version
                }

                fn timestamp(&self) -> Timestamp {
                    self.timestamp
                }

                fn visible(&self) -> bool {
                    self.visible
                }

                fn tags(&self) -> &Tags {
                    &self.tags
                }
            }
        )*
    };
}

impl_entity!(Node, Way, Relation);

impl MemberType {
    pub fn from_xml(value: &[u8]) -> Option<MemberType> {
        match value {
            b"node" => Some(MemberType::Node),
            b"way" => Some(MemberType::Way),
            b"relation" => Some(MemberType::Relation),
            _ => None,
        }
    }
}
