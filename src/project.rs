//! Reprojection of geographic coordinates.

use std::f64::consts::PI;

use geo_types::{coord, Coord};
use thiserror::Error;

/// Spatial reference id of spherical (web) mercator, the legacy "google" code.
pub const SRID_MERCATOR: i32 = 900913;

/// Spatial reference id of plain WGS84 longitude/latitude.
pub const SRID_WGS84: i32 = 4326;

/// Earth radius used by spherical mercator, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude at which spherical mercator becomes a square.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("coordinate ({lon}, {lat}) is outside the projection's domain")]
    OutOfDomain { lon: f64, lat: f64 },
}

/// Maps a longitude/latitude pair into the target coordinate system.
pub trait Projection {
    fn to_projected(&self, lon: f64, lat: f64) -> Result<Coord<f64>, ProjectionError>;
}

/// EPSG:900913 / EPSG:3857.
#[derive(Debug, Default, Clone, Copy)]
pub struct SphericalMercator;

impl Projection for SphericalMercator {
    fn to_projected(&self, lon: f64, lat: f64) -> Result<Coord<f64>, ProjectionError> {
        if !lon.is_finite()
            || !lat.is_finite()
            || !(-180.0..=180.0).contains(&lon)
            || !(-MAX_MERCATOR_LAT..=MAX_MERCATOR_LAT).contains(&lat)
        {
            return Err(ProjectionError::OutOfDomain { lon, lat });
        }

        let x = EARTH_RADIUS * lon * PI / 180.0;
        let y = EARTH_RADIUS * (lat * PI / 180.0).tan().asinh();
        Ok(coord! { x: x, y: y })
    }
}
