use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How a caller-facing surface should treat an error: whether retrying the
/// same operation might succeed, whether it never will, and whether the
/// message is safe to hand to an untrusted caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Transient,
    Permanent,
    Confidential,
}

/// Errors raised while constructing or validating the core data model
/// (`GridCrs`, `DataDescription`, `SpatialRect`, feature metadata, ...).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(display("GridCrs must have 1-3 dimensions, got {dimensions}"))]
    InvalidDimensions { dimensions: usize },

    #[snafu(display("GridCrs size[{axis}] = {size} exceeds the 2^24 limit"))]
    SizeOutOfLimits { axis: usize, size: u64 },

    #[snafu(display("GridCrs scale[{axis}] must not be zero"))]
    ZeroScale { axis: usize },

    #[snafu(display("DataDescription min ({min}) must be <= max ({max})"))]
    InvalidDataRange { min: f64, max: f64 },

    #[snafu(display("SpatialRect requires x1 <= x2 and y1 <= y2, got ({x1},{y1}) -> ({x2},{y2})"))]
    InvalidRect { x1: f64, y1: f64, x2: f64, y2: f64 },

    #[snafu(display("TimeInterval requires t1 <= t2, got {t1} -> {t2}"))]
    InvalidTimeInterval { t1: i64, t2: i64 },

    #[snafu(display("unknown element type string: {found}"))]
    UnknownElementType { found: String },

    #[snafu(display("feature time presence does not match collection's has_time"))]
    FeatureTimeMismatch,
}

impl Error {
    pub fn classification(&self) -> Classification {
        // every variant here is a malformed-input problem: retrying without
        // changing the input cannot help.
        Classification::Permanent
    }
}
