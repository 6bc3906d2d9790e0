mod feature_collection;
mod geometry;
mod metadata;
mod unit;

pub use feature_collection::{FeatureCollection, LineCollection, PointCollection, PolygonCollection};
pub use geometry::{Coordinate, Geometry, GeometryKind, MultiLineString, MultiPoint, MultiPolygon};
pub use metadata::DataSetMetaData;
pub use unit::Unit;
