/// Coordinate types and utilities.
///
/// Boxes are assumed to sit inside one hemisphere; nothing here handles the poles or the
/// antimeridian, jittered points are clamped to the valid WGS 84 ranges instead.
use rand::Rng;

use crate::{Error, TGResult};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// (latitude, longitude) in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Point2d(pub f64, pub f64);

impl Point2d {
    /// Random point within `max_deg` of this one on each axis. Never wraps past ±90 / ±180.
    pub fn jitter<R: Rng + ?Sized>(&self, rng: &mut R, max_deg: f64) -> Point2d {
        if max_deg <= 0.0 {
            return *self;
        }
        let lat = self.0 + rng.gen_range(-max_deg..=max_deg);
        let lon = self.1 + rng.gen_range(-max_deg..=max_deg);
        Point2d(lat.clamp(-90.0, 90.0), lon.clamp(-180.0, 180.0))
    }
}

/// Bounding box rectangle with corners in WGS 84 coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BBoxWGS {
    pub upper_left: Point2d,
    pub lower_right: Point2d,
}

impl BBoxWGS {
    pub fn new(upper_left: Point2d, lower_right: Point2d) -> TGResult<Self> {
        Self::validate_lat_lon(upper_left)?;
        Self::validate_lat_lon(lower_right)?;
        if upper_left.0 < lower_right.0 {
            return Err(Error::InvalidCoord(format!(
                "upper latitude {} is south of lower latitude {}",
                upper_left.0, lower_right.0
            )));
        }
        if upper_left.1 > lower_right.1 {
            return Err(Error::InvalidCoord(format!(
                "left longitude {} is east of right longitude {}",
                upper_left.1, lower_right.1
            )));
        }
        Ok(Self {
            upper_left,
            lower_right,
        })
    }

    /// Build from min/max ranges, the way the configuration describes a box.
    pub fn from_ranges(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> TGResult<Self> {
        Self::new(Point2d(lat_max, lon_min), Point2d(lat_min, lon_max))
    }

    pub fn lat_min(&self) -> f64 {
        self.lower_right.0
    }

    pub fn lat_max(&self) -> f64 {
        self.upper_left.0
    }

    pub fn lon_min(&self) -> f64 {
        self.upper_left.1
    }

    pub fn lon_max(&self) -> f64 {
        self.lower_right.1
    }

    pub fn contains(&self, point: Point2d) -> bool {
        (self.lat_min()..=self.lat_max()).contains(&point.0)
            && (self.lon_min()..=self.lon_max()).contains(&point.1)
    }

    /// Clamp a point onto the box.
    pub fn clamp(&self, point: Point2d) -> Point2d {
        Point2d(
            point.0.clamp(self.lat_min(), self.lat_max()),
            point.1.clamp(self.lon_min(), self.lon_max()),
        )
    }

    pub fn midpoint(&self) -> Point2d {
        Point2d(
            (self.upper_left.0 + self.lower_right.0) / 2.0,
            (self.upper_left.1 + self.lower_right.1) / 2.0,
        )
    }

    /// Uniformly distributed point inside the box (edges included).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Point2d {
        Point2d(
            rng.gen_range(self.lat_min()..=self.lat_max()),
            rng.gen_range(self.lon_min()..=self.lon_max()),
        )
    }

    fn validate_lat_lon(coord: Point2d) -> TGResult<()> {
        Self::validate_lat(coord.0)?;
        Self::validate_lon(coord.1)?;
        Ok(())
    }

    fn validate_lat(lat: f64) -> TGResult<()> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidCoord(format!("latitude {lat}")));
        }
        Ok(())
    }

    fn validate_lon(lon: f64) -> TGResult<()> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidCoord(format!("longitude {lon}")));
        }
        Ok(())
    }

    pub fn meter_per_deg_lat(lat_deg: f64) -> TGResult<f64> {
        Self::validate_lat(lat_deg)?;
        // WGS 84 meridian arc per degree, truncated series
        let lat_rad = lat_deg.to_radians();
        Ok(
            111132.92 - 559.82 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
                - 0.0023 * (6.0 * lat_rad).cos(),
        )
    }

    pub fn meter_per_deg_lon(lat_deg: f64) -> TGResult<f64> {
        Self::validate_lat(lat_deg)?;
        let lat_rad = lat_deg.to_radians();
        // shrinks with the circle of latitude, zero at the poles
        Ok(
            111412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos()
                + 0.118 * (5.0 * lat_rad).cos(),
        )
    }
}

/// Compass heading in degrees clockwise from north, kept in [0, 360).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Heading(pub f32);

impl Heading {
    pub fn rot(&mut self, deg_cw: f32) {
        self.0 = (self.0 + deg_cw).rem_euclid(360.0);
    }
    pub fn to_radians(&self) -> f32 {
        self.0.to_radians()
    }
}

impl From<f32> for Heading {
    fn from(deg: f32) -> Self {
        Self(deg.rem_euclid(360.0))
    }
}

impl From<Heading> for f32 {
    fn from(h: Heading) -> f32 {
        h.0
    }
}
