//! Builds the shape of a way as it looked at a given point in history.
//!
//! Each node reference is resolved against the nodestore at the requested timestamp and
//! reprojected. Nodes that cannot be resolved or projected are skipped, partial history is
//! the normal case. Tags decide whether a closed way may become a polygon; everything else is
//! built as a line.

use geo_types::{Coord, Geometry};
use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;
use wkt::ToWkt;

use crate::data::osm::{OsmId, Timestamp};
use crate::nodestore::CoordinateStore;
use crate::project::{Projection, SRID_MERCATOR, SRID_WGS84};
use crate::shape::{self, ShapeError};

/// Which importer run a builder serves. Both run the same algorithm today.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderMode {
    #[default]
    Import,
    Update,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeomBuilderConfig {
    pub mode: BuilderMode,
    /// Skip reprojection and emit longitude/latitude as-is.
    pub keep_lat_lng: bool,
    /// Trace every resolved node reference.
    pub debug: bool,
    /// Report why a way or one of its coordinates was skipped.
    pub show_errors: bool,
    /// Tag unprojected output with 4326 instead of the mercator SRID.
    pub srid_follows_projection: bool,
}

impl GeomBuilderConfig {
    pub fn import() -> Self {
        GeomBuilderConfig {
            mode: BuilderMode::Import,
            ..Default::default()
        }
    }

    pub fn update() -> Self {
        GeomBuilderConfig {
            mode: BuilderMode::Update,
            ..Default::default()
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildFailure {
    #[error("found only {found} valid coordinates")]
    TooFewCoordinates { found: usize },

    #[error("geometry rejected: {0}")]
    GeometryEngine(#[from] ShapeError),
}

/// Shape of a way at one instant, tagged with the SRID its coordinates are labelled with.
#[derive(Debug, Clone, PartialEq)]
pub struct WayGeometry {
    pub geometry: Geometry<f64>,
    pub srid: i32,
}

impl WayGeometry {
    pub fn is_polygon(&self) -> bool {
        matches!(self.geometry, Geometry::Polygon(_))
    }

    pub fn kind(&self) -> &'static str {
        if self.is_polygon() {
            "polygon"
        } else {
            "line"
        }
    }

    /// Points of the line, or of the polygon's exterior ring.
    pub fn coords(&self) -> Vec<Coord<f64>> {
        match &self.geometry {
            Geometry::Polygon(polygon) => polygon.exterior().0.clone(),
            Geometry::LineString(line) => line.0.clone(),
            _ => Vec::new(),
        }
    }

    /// Extended WKT as understood by PostGIS, e.g. `SRID=900913;LINESTRING(...)`.
    pub fn to_ewkt(&self) -> String {
        format!("SRID={};{}", self.srid, self.geometry.wkt_string())
    }
}

/// Builds way geometries from a borrowed nodestore and projection.
pub struct GeomBuilder<'a, S, P> {
    nodestore: &'a S,
    projection: &'a P,
    config: GeomBuilderConfig,
}

impl<'a, S: CoordinateStore, P: Projection> GeomBuilder<'a, S, P> {
    pub fn new(nodestore: &'a S, projection: &'a P, config: GeomBuilderConfig) -> Self {
        if config.keep_lat_lng && !config.srid_follows_projection {
            warn!(srid = SRID_MERCATOR; "Keeping lat/lng coordinates but tagging them with the mercator SRID");
        }
        GeomBuilder {
            nodestore,
            projection,
            config,
        }
    }

    pub fn import(nodestore: &'a S, projection: &'a P) -> Self {
        Self::new(nodestore, projection, GeomBuilderConfig::import())
    }

    pub fn update(nodestore: &'a S, projection: &'a P) -> Self {
        Self::new(nodestore, projection, GeomBuilderConfig::update())
    }

    pub fn config(&self) -> &GeomBuilderConfig {
        &self.config
    }

    pub fn mode(&self) -> BuilderMode {
        self.config.mode
    }

    pub fn is_keeping_lat_lng(&self) -> bool {
        self.config.keep_lat_lng
    }

    pub fn is_printing_debug_messages(&self) -> bool {
        self.config.debug
    }

    /// SRID every geometry from this builder is tagged with.
    pub fn srid(&self) -> i32 {
        if self.config.keep_lat_lng && self.config.srid_follows_projection {
            SRID_WGS84
        } else {
            SRID_MERCATOR
        }
    }

    /// Geometry of a way made of `node_refs` as it looked at `t`.
    ///
    /// A polygon is only built when `looks_like_polygon` is set, the first and last usable
    /// coordinates are equal and there are at least 4 of them. Fails when fewer than 2 usable
    /// coordinates remain or the shape is rejected.
    pub fn for_way(
        &self,
        node_refs: &[OsmId],
        t: Timestamp,
        looks_like_polygon: bool,
    ) -> Result<WayGeometry, BuildFailure> {
        let coords = self.resolve(node_refs, t);

        if coords.len() < 2 {
            if self.config.show_errors {
                warn!(found = coords.len(), t = t; "Found too few valid coordinates, skipping way");
            }
            return Err(BuildFailure::TooFewCoordinates { found: coords.len() });
        }

        let is_ring = coords.first() == coords.last() && coords.len() >= 4;
        let built = if looks_like_polygon && is_ring {
            shape::polygon(coords).map(Geometry::Polygon)
        } else {
            shape::line(coords).map(Geometry::LineString)
        };

        match built {
            Ok(geometry) => Ok(WayGeometry {
                geometry,
                srid: self.srid(),
            }),
            Err(err) => {
                if self.config.show_errors {
                    warn!(t = t, err:% = err; "Error creating geometry, skipping way");
                }
                Err(err.into())
            }
        }
    }

    fn resolve(&self, node_refs: &[OsmId], t: Timestamp) -> Vec<Coord<f64>> {
        let mut coords = Vec::with_capacity(node_refs.len());
        for &id in node_refs {
            let Some(info) = self.nodestore.lookup(id, t) else {
                if self.config.debug {
                    debug!(node_id = id, t = t; "Node missing at timestamp");
                }
                continue;
            };

            if self.config.debug {
                debug!(node_id = id, t = t, lon = info.lon, lat = info.lat; "Way references node");
            }

            if self.config.keep_lat_lng {
                if info.lon.is_finite() && info.lat.is_finite() {
                    coords.push(Coord { x: info.lon, y: info.lat });
                } else if self.config.show_errors {
                    warn!(node_id = id, lon = info.lon, lat = info.lat; "Node has no finite coordinate, skipping it");
                }
                continue;
            }

            match self.projection.to_projected(info.lon, info.lat) {
                Ok(projected) => coords.push(projected),
                Err(err) => {
                    if self.config.show_errors {
                        warn!(node_id = id, err:% = err; "Could not reproject node, skipping it");
                    }
                }
            }
        }
        coords
    }
}
