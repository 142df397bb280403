//! Reconstruction core of an OSM full-history importer.
//!
//! [`tracker::EntityTracker`] walks versioned entity streams with a previous/current/next
//! window, [`geom_builder::GeomBuilder`] rebuilds the shape of a way at any instant from a
//! historical [`nodestore`]. The [`etl`] stages wire both together: parse an .osh file, then
//! write one geometry per way version and node change.

pub mod classify;
pub mod data;
pub mod errors;
pub mod etl;
pub mod geom_builder;
pub mod nodestore;
pub mod project;
pub mod shape;
pub mod tracker;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::errors::Result;
use crate::geom_builder::{BuilderMode, GeomBuilderConfig};

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct ImporterConfig {
    /// .osh / .osm file, optionally xz compressed.
    pub data_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub mode: BuilderMode,
    #[serde(default)]
    pub keep_lat_lng: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub show_errors: bool,
    #[serde(default)]
    pub srid_follows_projection: bool,
    /// Ignore cached stage outputs.
    #[serde(default)]
    pub rebuild: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ImporterConfig {
    pub fn builder_config(&self) -> GeomBuilderConfig {
        GeomBuilderConfig {
            mode: self.mode,
            keep_lat_lng: self.keep_lat_lng,
            debug: self.debug,
            show_errors: self.show_errors,
            srid_follows_projection: self.srid_follows_projection,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ImporterConfig> {
    let file = File::open(path)
        .map_err(|e| format!("Could not open config file {}: {}", path.display(), e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: ImporterConfig = serde_json::from_str(r#"{"data_path": "history.osh"}"#).unwrap();
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.mode, BuilderMode::Import);
        assert_eq!(config.log_level, "info");
        assert!(!config.keep_lat_lng);
        assert_eq!(config.builder_config(), GeomBuilderConfig::import());
    }

    #[test]
    fn test_config_update_mode() {
        let config: ImporterConfig = serde_json::from_str(
            r#"{"data_path": "diff.osc", "mode": "update", "keep_lat_lng": true, "show_errors": true}"#,
        )
        .unwrap();
        let builder = config.builder_config();
        assert_eq!(builder.mode, BuilderMode::Update);
        assert!(builder.keep_lat_lng);
        assert!(builder.show_errors);
        assert!(!builder.debug);
    }

    #[test]
    fn test_load_missing_config() {
        let err = load_config(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.message.contains("Could not open config file"));
    }
}
