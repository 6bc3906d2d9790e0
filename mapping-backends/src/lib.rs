pub mod codec;
pub mod error;
pub mod feature_backend;
pub mod image_library;
pub mod in_memory_feature_backend;
pub mod raster_backend;
pub mod sqlite_raster_backend;

pub use codec::{CodecRegistry, GzipCodec, RawCodec, TileCodec};
pub use error::Error;
pub use feature_backend::{AnyFeatureCollection, FeatureBackend, FeatureBackendRegistry};
pub use image_library::{ImageLibrary, NullImageLibrary};
pub use in_memory_feature_backend::InMemoryFeatureBackend;
pub use raster_backend::{ClosestRaster, RasterBackend, RasterBackendRegistry, TileHandle};
pub use sqlite_raster_backend::SqliteRasterBackend;
