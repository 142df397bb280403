//! Historical node coordinates.

use std::collections::HashMap;

use crate::data::osm::{OsmId, Timestamp};

/// Coordinate of one node version together with its validity range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeInfo {
    pub lon: f64,
    pub lat: f64,
    pub valid_from: Timestamp,
    /// `None` while this is the latest version.
    pub valid_to: Option<Timestamp>,
}

impl NodeInfo {
    fn covers(&self, t: Timestamp) -> bool {
        self.valid_from <= t && self.valid_to.map_or(true, |valid_to| t < valid_to)
    }
}

/// Resolves a node's coordinate as it was at a given instant.
pub trait CoordinateStore {
    /// `None` if the node did not exist at `t`, was deleted, or is unknown to the store.
    fn lookup(&self, id: OsmId, t: Timestamp) -> Option<NodeInfo>;
}

/// Nodestore kept entirely in memory, one sorted range list per node.
#[derive(Debug, Default)]
pub struct MemoryNodestore {
    nodes: HashMap<OsmId, Vec<NodeInfo>>,
}

impl MemoryNodestore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visible node version. Deleted versions are not recorded, which leaves a gap
    /// that lookups report as missing.
    pub fn record(
        &mut self,
        id: OsmId,
        valid_from: Timestamp,
        valid_to: Option<Timestamp>,
        lon: f64,
        lat: f64,
    ) {
        let versions = self.nodes.entry(id).or_default();
        let info = NodeInfo { lon, lat, valid_from, valid_to };
        let position = versions.partition_point(|v| v.valid_from <= valid_from);
        versions.insert(position, info);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Instants strictly inside `(from, to)` at which the coordinate of `id` appeared, moved or
    /// disappeared, sorted and deduplicated. `to = None` means no upper bound.
    pub fn changes_between(&self, id: OsmId, from: Timestamp, to: Option<Timestamp>) -> Vec<Timestamp> {
        let Some(versions) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut changes: Vec<Timestamp> = versions
            .iter()
            .flat_map(|v| std::iter::once(v.valid_from).chain(v.valid_to))
            .filter(|&t| t > from && to.map_or(true, |to| t < to))
            .collect();
        changes.sort_unstable();
        changes.dedup();
        changes
    }
}

impl CoordinateStore for MemoryNodestore {
    fn lookup(&self, id: OsmId, t: Timestamp) -> Option<NodeInfo> {
        let versions = self.nodes.get(&id)?;
        // last range starting at or before t
        let position = versions.partition_point(|v| v.valid_from <= t);
        let candidate = versions[..position].last()?;
        candidate.covers(t).then_some(*candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryNodestore {
        let mut store = MemoryNodestore::new();
        store.record(1, 100, Some(200), 10.0, 50.0);
        store.record(1, 200, Some(300), 10.5, 50.5);
        // version 3 deleted at 300, restored at 400
        store.record(1, 400, None, 11.0, 51.0);
        store
    }

    #[test]
    fn test_lookup_inside_range() {
        let store = store();
        let info = store.lookup(1, 150).unwrap();
        assert_eq!((info.lon, info.lat), (10.0, 50.0));

        let info = store.lookup(1, 200).unwrap();
        assert_eq!((info.lon, info.lat), (10.5, 50.5));
    }

    #[test]
    fn test_lookup_before_creation() {
        assert_eq!(store().lookup(1, 99), None);
    }

    #[test]
    fn test_lookup_in_deletion_gap() {
        assert_eq!(store().lookup(1, 300), None);
        assert_eq!(store().lookup(1, 399), None);
    }

    #[test]
    fn test_lookup_open_ended() {
        let info = store().lookup(1, 1_000_000).unwrap();
        assert_eq!(info.valid_to, None);
        assert_eq!((info.lon, info.lat), (11.0, 51.0));
    }

    #[test]
    fn test_lookup_unknown_node() {
        assert_eq!(store().lookup(2, 150), None);
    }

    #[test]
    fn test_record_out_of_order() {
        let mut store = MemoryNodestore::new();
        store.record(5, 200, None, 2.0, 2.0);
        store.record(5, 100, Some(200), 1.0, 1.0);
        assert_eq!(store.lookup(5, 150).map(|i| i.lon), Some(1.0));
        assert_eq!(store.lookup(5, 250).map(|i| i.lon), Some(2.0));
    }

    #[test]
    fn test_changes_between() {
        let store = store();
        assert_eq!(store.changes_between(1, 100, None), vec![200, 300, 400]);
        assert_eq!(store.changes_between(1, 100, Some(400)), vec![200, 300]);
        assert_eq!(store.changes_between(1, 300, Some(400)), Vec::<Timestamp>::new());
        assert!(store.changes_between(9, 0, None).is_empty());
    }
}
