use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// Opaque identifier of a coordinate reference system, e.g. `CrsId::new("EPSG", 4326)`.
///
/// Equality is by value; the engine never interprets the code itself, it
/// only compares `CrsId`s and hands them to the external CRS utility (out
/// of scope, see `spec.md` §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrsId {
    pub authority: &'static str,
    pub code: u32,
}

impl CrsId {
    pub const fn new(authority: &'static str, code: u32) -> Self {
        Self { authority, code }
    }

    pub const UNREFERENCED: CrsId = CrsId::new("UNREFERENCED", 0);
    pub const WGS84: CrsId = CrsId::new("EPSG", 4326);
}

impl std::fmt::Display for CrsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

/// A spatial rectangle in `crs` coordinates, `x1 <= x2`, `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub crs: CrsId,
}

impl SpatialRect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, crs: CrsId) -> Result<Self> {
        ensure!(x1 <= x2 && y1 <= y2, error::InvalidRect { x1, y1, x2, y2 });
        Ok(Self { x1, y1, x2, y2, crs })
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn intersects(&self, other: &SpatialRect) -> bool {
        self.x1 <= other.x2 && self.x2 >= other.x1 && self.y1 <= other.y2 && self.y2 >= other.y1
    }
}

/// Tags the temporal domain of a `TimeInterval`: either real unix time or
/// an unreferenced (purely ordinal) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalRef {
    Unix,
    Unreferenced,
}

/// `[t1, t2]` in unix seconds, `t1 <= t2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub t1: i64,
    pub t2: i64,
}

impl TimeInterval {
    pub fn new(t1: i64, t2: i64) -> Result<Self> {
        ensure!(t1 <= t2, error::InvalidTimeInterval { t1, t2 });
        Ok(Self { t1, t2 })
    }

    /// A single-instant interval `[t, t]`.
    pub fn instant(t: i64) -> Self {
        Self { t1: t, t2: t }
    }

    pub fn contains(&self, t: i64) -> bool {
        self.t1 <= t && t <= self.t2
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.t1 <= other.t2 && other.t1 <= self.t2
    }

    pub fn length(&self) -> i64 {
        self.t2 - self.t1
    }
}

/// Requested output resolution of a raster query, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QueryResolution {
    None,
    Pixels { xres: u32, yres: u32 },
}

impl QueryResolution {
    pub fn pixels(&self) -> Option<(u32, u32)> {
        match self {
            QueryResolution::None => None,
            QueryResolution::Pixels { xres, yres } => Some((*xres, *yres)),
        }
    }
}

/// The spatio-temporal window (plus optional resolution) a query is
/// evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryRect {
    pub spatial: SpatialRect,
    pub time: TimeInterval,
    pub temporal_ref: TemporalRef,
    pub resolution: QueryResolution,
}

impl QueryRect {
    pub fn new(
        spatial: SpatialRect,
        time: TimeInterval,
        temporal_ref: TemporalRef,
        resolution: QueryResolution,
    ) -> Self {
        Self {
            spatial,
            time,
            temporal_ref,
            resolution,
        }
    }

    pub fn crs(&self) -> CrsId {
        self.spatial.crs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_requires_ordered_bounds() {
        assert!(SpatialRect::new(0.0, 0.0, 1.0, 1.0, CrsId::WGS84).is_ok());
        assert!(SpatialRect::new(1.0, 0.0, 0.0, 1.0, CrsId::WGS84).is_err());
    }

    #[test]
    fn interval_overlap() {
        let a = TimeInterval::new(2, 4).unwrap();
        let b = TimeInterval::new(4, 8).unwrap();
        let c = TimeInterval::new(5, 8).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
