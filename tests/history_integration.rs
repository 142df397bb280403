//! Integration tests for the history importer.
//!
//! These tests verify:
//! - the tracker window over a stream of entity versions
//! - way geometries rebuilt against a historical nodestore
//! - the full parse → build pipeline writing JSON lines
//!
//! Run with: `cargo test --test history_integration`

use std::fs;
use std::path::Path;

use geo_types::coord;

use osm_history_importer::data::osm::{Node, OsmId, Tags, Timestamp, Way};
use osm_history_importer::etl::build_geometries::{BuildGeometriesEtl, GeometryRow};
use osm_history_importer::etl::parse_history::ParseHistoryEtl;
use osm_history_importer::etl::Etl;
use osm_history_importer::geom_builder::{BuildFailure, GeomBuilder, GeomBuilderConfig};
use osm_history_importer::nodestore::MemoryNodestore;
use osm_history_importer::project::{Projection, SphericalMercator, SRID_MERCATOR};
use osm_history_importer::tracker::{EntityTracker, TrackerError};
use osm_history_importer::ImporterConfig;

// ============================================================================
// Helper Functions
// ============================================================================

fn way(id: OsmId, version: u32, timestamp: Timestamp) -> Way {
    Way {
        id,
        version,
        timestamp,
        visible: true,
        node_refs: vec![1, 2],
        tags: Tags::new(),
    }
}

/// Unit square corners 1..=4, valid from the epoch on.
fn square_store() -> MemoryNodestore {
    let mut store = MemoryNodestore::new();
    store.record(1, 0, None, 0.0, 0.0);
    store.record(2, 0, None, 1.0, 0.0);
    store.record(3, 0, None, 1.0, 1.0);
    store.record(4, 0, None, 0.0, 1.0);
    store
}

fn raw() -> GeomBuilderConfig {
    GeomBuilderConfig {
        keep_lat_lng: true,
        ..GeomBuilderConfig::import()
    }
}

const HISTORY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="history-test">
  <node id="1" version="1" timestamp="2012-01-01T00:00:00Z" lat="51.50" lon="-0.10" visible="true"/>
  <node id="2" version="1" timestamp="2012-01-01T00:00:00Z" lat="51.50" lon="-0.09" visible="true"/>
  <node id="3" version="1" timestamp="2012-01-01T00:00:00Z" lat="51.51" lon="-0.09" visible="true"/>
  <node id="3" version="2" timestamp="2013-01-01T00:00:00Z" lat="51.52" lon="-0.09" visible="true"/>
  <way id="100" version="1" timestamp="2012-06-01T00:00:00Z" visible="true">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="3"/>
    <nd ref="1"/>
    <tag k="leisure" v="park"/>
  </way>
  <way id="100" version="2" timestamp="2014-01-01T00:00:00Z" visible="false"/>
  <way id="101" version="1" timestamp="2012-06-01T00:00:00Z" visible="true">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="footway"/>
  </way>
</osm>
"#;

// ============================================================================
// Entity Tracker
// ============================================================================

#[test]
fn test_tracker_walks_versions_and_entities() {
    let a = way(1, 1, 100);
    let a2 = way(1, 2, 200);
    let b = way(2, 1, 150);
    let mut tracker = EntityTracker::new();

    tracker.feed(&a).unwrap();
    tracker.swap();
    assert_eq!(tracker.current(), Some(&a));
    assert!(!tracker.has_previous());

    tracker.feed(&a2).unwrap();
    tracker.swap();
    assert_eq!(tracker.previous(), Some(&a));
    assert_eq!(tracker.current(), Some(&a2));
    assert!(tracker.previous_is_same_entity());

    tracker.feed(&b).unwrap();
    assert!(!tracker.next_is_same_entity());
    tracker.swap();
    assert_eq!(tracker.previous(), Some(&a2));
    assert_eq!(tracker.current(), Some(&b));
    assert!(!tracker.previous_is_same_entity());
    assert!(!tracker.has_next());
}

#[test]
fn test_tracker_double_feed_is_deterministic() {
    let mut tracker = EntityTracker::new();
    tracker.feed(&way(1, 1, 100)).unwrap();

    let first = tracker.feed(&way(2, 1, 100)).unwrap_err();
    let second = tracker.feed(&way(2, 1, 100)).unwrap_err();
    assert_eq!(first, second);
    assert_eq!(first, TrackerError::ProtocolViolation { pending: 1, fed: 2 });

    tracker.swap();
    assert_eq!(tracker.current().map(|w| w.id), Some(1));
}

#[test]
fn test_tracker_over_nodes() {
    let node = Node {
        id: 5,
        version: 1,
        timestamp: 0,
        visible: true,
        lon: 1.0,
        lat: 2.0,
        tags: Tags::new(),
    };
    let mut tracker = EntityTracker::new();
    tracker.feed(&node).unwrap();
    tracker.swap();
    assert_eq!(tracker.current().map(|n| (n.lon, n.lat)), Some((1.0, 2.0)));
}

// ============================================================================
// Geometry Builder
// ============================================================================

#[test]
fn test_closed_area_polygon_ring() {
    let store = square_store();
    let builder = GeomBuilder::new(&store, &SphericalMercator, raw());

    let geometry = builder.for_way(&[1, 2, 3, 1], 0, true).unwrap();
    assert!(geometry.is_polygon());
    let ring = geometry.coords();
    assert_eq!(ring.len(), 4);
    assert_eq!(ring[0], ring[3]);
}

#[test]
fn test_closed_non_area_line() {
    let store = square_store();
    let builder = GeomBuilder::new(&store, &SphericalMercator, raw());

    let geometry = builder.for_way(&[1, 2, 3, 1], 0, false).unwrap();
    assert!(!geometry.is_polygon());
    assert_eq!(geometry.coords().len(), 4);
}

#[test]
fn test_one_resolvable_node() {
    let store = square_store();
    let builder = GeomBuilder::new(&store, &SphericalMercator, raw());

    assert_eq!(
        builder.for_way(&[1, 40, 41, 42], 0, false),
        Err(BuildFailure::TooFewCoordinates { found: 1 })
    );
}

#[test]
fn test_keep_lat_lng_versus_projection() {
    let store = square_store();
    let raw_builder = GeomBuilder::new(&store, &SphericalMercator, raw());
    let projected_builder = GeomBuilder::import(&store, &SphericalMercator);

    let raw_coords = raw_builder.for_way(&[2, 3], 0, false).unwrap().coords();
    assert_eq!(raw_coords, vec![coord! { x: 1.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }]);

    let projected = projected_builder.for_way(&[2, 3], 0, false).unwrap();
    let expected: Vec<_> = [(1.0, 0.0), (1.0, 1.0)]
        .iter()
        .map(|&(lon, lat)| SphericalMercator.to_projected(lon, lat).unwrap())
        .collect();
    assert_eq!(projected.coords(), expected);
    assert_ne!(projected.coords(), raw_coords);
    assert_eq!(projected.srid, SRID_MERCATOR);
}

// ============================================================================
// Pipeline
// ============================================================================

fn read_rows(dir: &Path) -> Vec<GeometryRow> {
    fs::read_to_string(dir.join("way_geometries.jsonl"))
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_pipeline_writes_geometries() {
    let temp = tempfile::tempdir().unwrap();
    let data_path = temp.path().join("history.osh");
    fs::write(&data_path, HISTORY).unwrap();

    let config: ImporterConfig = serde_json::from_value(serde_json::json!({
        "data_path": data_path.to_str().unwrap(),
        "output_dir": temp.path().to_str().unwrap(),
    }))
    .unwrap();

    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let mut parse = ParseHistoryEtl::new(&config);
    parse.process(&out).unwrap();
    assert!(parse.is_cached(&out).unwrap());

    let mut build = BuildGeometriesEtl::new(&config);
    build.process(&out).unwrap();

    let rows = read_rows(&out);
    let summary: Vec<_> = rows
        .iter()
        .map(|r| (r.way_id, r.version, r.minor, r.kind.as_str()))
        .collect();
    // park: own edit, then node 3 moving; footway: one line
    assert_eq!(
        summary,
        vec![(100, 1, 0, "polygon"), (100, 1, 1, "polygon"), (101, 1, 0, "line")]
    );

    let park = &rows[0];
    assert_eq!(park.valid_from, 1_338_508_800);
    assert_eq!(park.valid_to, Some(1_356_998_400));
    assert_eq!(rows[1].valid_to, Some(1_388_534_400));
    assert!(park.ewkt.starts_with("SRID=900913;POLYGON"));
    assert_eq!(rows[2].valid_to, None);

    // a second run is served from the cache, a rebuild replaces it
    build.process(&out).unwrap();
    build.rebuild(&out).unwrap();
    assert_eq!(read_rows(&out), rows);
}

#[test]
fn test_pipeline_missing_input() {
    let temp = tempfile::tempdir().unwrap();
    let config: ImporterConfig = serde_json::from_value(serde_json::json!({
        "data_path": temp.path().join("missing.osh").to_str().unwrap(),
    }))
    .unwrap();

    let mut parse = ParseHistoryEtl::new(&config);
    assert!(parse.process(temp.path()).is_err());
}
