pub mod config;
pub mod error;
pub mod external_catalog;
pub mod feature_collection_db;
pub mod operator_registry;
pub mod operators;
pub mod query_processor;
pub mod raster_db;
pub mod time_snap;

pub use config::{default_configuration, Configuration};
pub use error::{Error, Result};
pub use external_catalog::{ExternalRasterCatalog, ExternalRasterDescriptor};
pub use feature_collection_db::FeatureCollectionDB;
pub use operator_registry::{Operator, OperatorFactory, OperatorNode, OperatorRegistry};
pub use query_processor::{Query, QueryProcessor, QueryProgress, QueryResult, ResultType};
pub use raster_db::{QueryProfiler, RasterDB};
pub use time_snap::{format_into_template, snap, TimeInterval as SnapInterval, TimeUnit};
