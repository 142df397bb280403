use self::osm::{Node, Relation, Way};

pub mod osm;

/// Full edit history as read from an .osh file. Every version of every entity is kept, in
/// document order: sorted by id, then by version.

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct OsmHistory {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
    pub relations: Vec<Relation>,
}
