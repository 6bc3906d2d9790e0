use crate::error::Error;
use async_trait::async_trait;
use mapping_datatypes::collections::{DataSetMetaData, LineCollection, PointCollection, PolygonCollection};
use mapping_datatypes::primitives::QueryRect;
use std::collections::HashMap;

/// A feature collection tagged by geometry kind, since backends persist and
/// load all three kinds through one interface (spec §4.6).
pub enum AnyFeatureCollection {
    Points(PointCollection),
    Lines(LineCollection),
    Polygons(PolygonCollection),
}

/// Storage abstraction for `FeatureCollectionDB` datasets (spec §4.6).
/// Implementations are registered by name, mirroring `RasterBackendRegistry`.
#[async_trait]
pub trait FeatureBackend: Send + Sync {
    /// Datasets whose permission token matches `data.featurecollectiondb_source.<id>`
    /// in `tokens`. The permission/user database itself is out of scope
    /// (spec §1); callers resolve `tokens` elsewhere.
    async fn load_metadata_for_user(&self, tokens: &[String]) -> Result<Vec<DataSetMetaData>, Error>;

    async fn load_metadata_by_name(&self, owner: &str, name: &str) -> Result<DataSetMetaData, Error>;

    async fn load_metadata_by_id(&self, id: u64) -> Result<DataSetMetaData, Error>;

    async fn create_collection(
        &self,
        owner: &str,
        name: &str,
        collection: AnyFeatureCollection,
    ) -> Result<u64, Error>;

    async fn load_collection(&self, owner: &str, name: &str, qrect: &QueryRect) -> Result<AnyFeatureCollection, Error>;
}

/// Constructs a named `FeatureBackend` instance, mirroring
/// `RasterBackendRegistry`: an explicit registry populated at startup by
/// the binary entry point.
pub type FeatureBackendFactory = fn(connection_string: &str) -> Result<Box<dyn FeatureBackend>, Error>;

#[derive(Default)]
pub struct FeatureBackendRegistry {
    factories: HashMap<String, FeatureBackendFactory>,
}

impl FeatureBackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: FeatureBackendFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn open(&self, name: &str, connection_string: &str) -> Result<Box<dyn FeatureBackend>, Error> {
        match self.factories.get(name) {
            Some(factory) => factory(connection_string),
            None => crate::error::UnknownBackend { name: name.to_string() }.fail(),
        }
    }
}
