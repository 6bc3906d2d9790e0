use crate::config::Configuration;
use crate::error::{self, Error};
use crate::feature_collection_db::FeatureCollectionDB;
use crate::operator_registry::{OperatorNode, OperatorRegistry};
use crate::raster_db::{QueryProfiler, RasterDB};
use mapping_backends::{FeatureBackendRegistry, ImageLibrary, RasterBackendRegistry};
use mapping_datatypes::primitives::QueryRect;
use mapping_datatypes::raster::Raster;
use mapping_datatypes::Classification;
use mapping_datatypes::collections::{LineCollection, PointCollection, PolygonCollection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};

/// The output kind a query's operator graph must produce (spec §4.7, §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultType {
    Raster,
    Points,
    Lines,
    Polygons,
    Plot,
    Error,
}

/// A discriminated query outcome (spec §4.7, §7): a typed payload, or an
/// error carrying its message and classification so an external surface can
/// decide whether to strip it before forwarding to an untrusted caller.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Raster(Raster),
    Points(PointCollection),
    Lines(LineCollection),
    Polygons(PolygonCollection),
    Plot(String),
    Error {
        message: String,
        classification: Classification,
    },
}

impl QueryResult {
    pub fn result_type(&self) -> ResultType {
        match self {
            QueryResult::Raster(_) => ResultType::Raster,
            QueryResult::Points(_) => ResultType::Points,
            QueryResult::Lines(_) => ResultType::Lines,
            QueryResult::Polygons(_) => ResultType::Polygons,
            QueryResult::Plot(_) => ResultType::Plot,
            QueryResult::Error { .. } => ResultType::Error,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        QueryResult::Error {
            message: error.to_string(),
            classification: error.classification(),
        }
    }

    pub fn as_raster(&self) -> Result<&Raster, Error> {
        match self {
            QueryResult::Raster(r) => Ok(r),
            _ => error::ArgumentError {
                reason: "query result is not a raster".to_string(),
            }
            .fail(),
        }
    }

    /// The exact spatial extent of `qrect`, cropped from the loose,
    /// tile-aligned raster (spec §4.7 "fit-to-query-rect" accessor mode).
    pub fn raster_fit_to_query_rect(&self, qrect: &QueryRect) -> Result<Raster, Error> {
        Ok(self.as_raster()?.fit_to_query_rect(qrect))
    }

    pub fn as_points(&self) -> Result<&PointCollection, Error> {
        match self {
            QueryResult::Points(c) => Ok(c),
            _ => error::ArgumentError {
                reason: "query result is not a point collection".to_string(),
            }
            .fail(),
        }
    }

    pub fn as_lines(&self) -> Result<&LineCollection, Error> {
        match self {
            QueryResult::Lines(c) => Ok(c),
            _ => error::ArgumentError {
                reason: "query result is not a line collection".to_string(),
            }
            .fail(),
        }
    }

    pub fn as_polygons(&self) -> Result<&PolygonCollection, Error> {
        match self {
            QueryResult::Polygons(c) => Ok(c),
            _ => error::ArgumentError {
                reason: "query result is not a polygon collection".to_string(),
            }
            .fail(),
        }
    }

    pub fn as_plot(&self) -> Result<&str, Error> {
        match self {
            QueryResult::Plot(s) => Ok(s.as_str()),
            _ => error::ArgumentError {
                reason: "query result is not a plot".to_string(),
            }
            .fail(),
        }
    }
}

/// A request: an operator graph, the result kind it must produce, and the
/// spatio-temporal window to evaluate it over (spec §6.4).
#[derive(Debug, Clone)]
pub struct Query {
    pub operator_graph: OperatorNode,
    pub result_type: ResultType,
    pub qrect: QueryRect,
}

impl Query {
    pub fn new(operator_graph_json: &str, result_type: ResultType, qrect: QueryRect) -> Result<Self, Error> {
        Ok(Self {
            operator_graph: OperatorNode::parse(operator_graph_json)?,
            result_type,
            qrect,
        })
    }
}

/// A progress handle for an in-flight query. The `local` processor runs
/// inline, so by the time one exists the result is already computed (spec
/// §5): `wait` is a no-op kept for API symmetry with a future out-of-process
/// processor.
pub struct QueryProgress {
    result: QueryResult,
}

impl QueryProgress {
    pub fn wait(&self) {}

    pub fn result(self) -> QueryResult {
        self.result
    }
}

/// Holds the process-wide handle cache of open `RasterDB`s and dispatches a
/// `Query`'s operator graph to the registered operators (spec §4.7, §5),
/// grounded in `original_source/queryprocessor.cpp`'s querymanager.
pub struct QueryProcessor {
    config: Configuration,
    raster_backends: RasterBackendRegistry,
    feature_backends: FeatureBackendRegistry,
    operators: OperatorRegistry,
    image_library: Arc<dyn ImageLibrary>,
    raster_handles: Mutex<HashMap<String, Weak<RasterDB>>>,
    feature_db: Mutex<Option<Arc<FeatureCollectionDB>>>,
}

impl QueryProcessor {
    pub fn new(
        config: Configuration,
        raster_backends: RasterBackendRegistry,
        feature_backends: FeatureBackendRegistry,
        operators: OperatorRegistry,
        image_library: Arc<dyn ImageLibrary>,
    ) -> Self {
        Self {
            config,
            raster_backends,
            feature_backends,
            operators,
            image_library,
            raster_handles: Mutex::new(HashMap::new()),
            feature_db: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The pluggable decoder external-source operators reach through to
    /// open a file outside any registered backend (spec §4.5).
    pub fn image_library(&self) -> &Arc<dyn ImageLibrary> {
        &self.image_library
    }

    /// Returns the shared `RasterDB` handle for `name`, opening it if no
    /// live handle exists. Lookup, weak-to-shared upgrade, insert, and
    /// eviction of a dead entry are all serialized by one mutex; the mutex
    /// is never held across backend I/O — construction happens after
    /// releasing it, with a retry against a winning concurrent opener
    /// (spec §5).
    pub async fn open_raster_db(&self, name: &str, writable: bool) -> Result<Arc<RasterDB>, Error> {
        {
            let mut handles = self.raster_handles.lock().expect("raster handle cache lock poisoned");
            match handles.get(name).and_then(Weak::upgrade) {
                Some(existing) => return Self::check_writable(existing, writable, name),
                None => {
                    handles.remove(name);
                }
            }
        }

        let backend_name: String = self.config.get("rasterdb.backend")?;
        let connection_string: String = self.config.get(&format!("rasterdb.{name}.location"))?;
        let backend = self.raster_backends.open(&backend_name, &connection_string, writable)?;
        let db = Arc::new(RasterDB::open(backend).await?);

        let mut handles = self.raster_handles.lock().expect("raster handle cache lock poisoned");
        if let Some(existing) = handles.get(name).and_then(Weak::upgrade) {
            // a concurrent opener won the race; use their handle, ours is dropped.
            return Self::check_writable(existing, writable, name);
        }
        handles.insert(name.to_string(), Arc::downgrade(&db));
        Ok(db)
    }

    fn check_writable(db: Arc<RasterDB>, writable: bool, name: &str) -> Result<Arc<RasterDB>, Error> {
        if writable && !db.is_writable() {
            return error::ArgumentError {
                reason: format!("dataset {name} is already open read-only"),
            }
            .fail();
        }
        Ok(db)
    }

    /// Returns the single registered `FeatureCollectionDB`, opening it on
    /// first use (spec §2 item 4: "owns a single registered backend
    /// instance").
    pub async fn feature_db(&self) -> Result<Arc<FeatureCollectionDB>, Error> {
        {
            let guard = self.feature_db.lock().expect("feature db cache lock poisoned");
            if let Some(db) = guard.as_ref() {
                return Ok(db.clone());
            }
        }

        let backend_name: String = self.config.get("featurecollectiondb.backend")?;
        let connection_string: String = self.config.get(&format!("featurecollectiondb.{backend_name}.location"))?;
        let backend = self.feature_backends.open(&backend_name, &connection_string)?;
        let db = Arc::new(FeatureCollectionDB::new(backend));

        let mut guard = self.feature_db.lock().expect("feature db cache lock poisoned");
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        *guard = Some(db.clone());
        Ok(db)
    }

    fn evaluate_node<'a>(
        &'a self,
        node: &'a OperatorNode,
        qrect: &'a QueryRect,
        profiler: &'a mut QueryProfiler,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResult, Error>> + Send + 'a>> {
        Box::pin(async move {
            let mut sources = Vec::with_capacity(node.sources.len());
            for child in &node.sources {
                sources.push(self.evaluate_node(child, qrect, profiler).await?);
            }
            let operator = self.operators.instantiate(&node.operator_type)?;
            operator.evaluate(node, sources, qrect, self, profiler).await
        })
    }

    /// Evaluates `query`'s operator graph and returns its already-completed
    /// progress handle (spec §4.7, §5). `include_provenance` is accepted for
    /// API parity; provenance/lineage attachment is an HTTP-layer concern
    /// out of scope here (spec §1).
    pub async fn process_async(&self, query: &Query, include_provenance: bool) -> QueryProgress {
        let _ = include_provenance;
        let mut profiler = QueryProfiler::new();
        let result = match self.evaluate_node(&query.operator_graph, &query.qrect, &mut profiler).await {
            Ok(result) if result.result_type() == query.result_type => result,
            Ok(result) => QueryResult::Error {
                message: format!(
                    "operator graph produced {:?} but {:?} was requested",
                    result.result_type(),
                    query.result_type
                ),
                classification: Classification::Permanent,
            },
            Err(error) => QueryResult::from_error(&error),
        };
        QueryProgress { result }
    }

    /// `process(query, include_provenance)`, defined as `progress.wait();
    /// progress.result()` (spec §4.7).
    pub async fn process(&self, query: &Query, include_provenance: bool) -> QueryResult {
        let progress = self.process_async(query, include_provenance).await;
        progress.wait();
        progress.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators;
    use config::{Config, File, FileFormat};
    use mapping_backends::SqliteRasterBackend;
    use mapping_datatypes::primitives::{CrsId, QueryResolution, SpatialRect, TemporalRef, TimeInterval};
    use mapping_datatypes::raster::{ElementType, Grid2D, TypedGrid};
    use std::collections::HashMap as StdHashMap;

    fn sqlite_factory(connection_string: &str, writable: bool) -> Result<Box<dyn mapping_backends::RasterBackend>, mapping_backends::Error> {
        SqliteRasterBackend::open(connection_string, None, writable).map(|b| Box::new(b) as Box<dyn mapping_backends::RasterBackend>)
    }

    fn descriptor_json() -> String {
        serde_json::json!({
            "coords": {"epsg": 4326, "size": [4, 4], "origin": [0.0, 0.0], "scale": [1.0, 1.0]},
            "channels": [{"datatype": "U8", "min": 0.0, "max": 255.0, "nodata": 255.0}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn raster_source_operator_round_trips_through_processor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proc.sqlite");
        {
            let backend = SqliteRasterBackend::open(path.to_str().unwrap(), Some(&descriptor_json()), true).unwrap();
            let db = RasterDB::open(Box::new(backend)).await.unwrap();
            let grid = TypedGrid::U8(Grid2D::from_data(4, 4, (0u8..16).collect(), Some(255)));
            db.import(0, grid, false, false, 0, 100, StdHashMap::new(), StdHashMap::new(), 0)
                .await
                .unwrap();
        }

        let inner = Config::builder()
            .add_source(File::from_str(
                &format!(
                    "rasterdb.backend = \"local\"\nrasterdb.temperature.location = \"{}\"",
                    path.to_str().unwrap().replace('\\', "\\\\")
                ),
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);

        let mut raster_backends = RasterBackendRegistry::new();
        raster_backends.register("local", sqlite_factory);
        let mut operator_registry = OperatorRegistry::new();
        operators::register_builtin(&mut operator_registry);

        let processor = QueryProcessor::new(
            config,
            raster_backends,
            FeatureBackendRegistry::new(),
            operator_registry,
            Arc::new(mapping_backends::NullImageLibrary),
        );

        let qrect = QueryRect::new(
            SpatialRect::new(0.0, 0.0, 4.0, 4.0, CrsId::new("EPSG", 4326)).unwrap(),
            TimeInterval::instant(50),
            TemporalRef::Unix,
            QueryResolution::None,
        );
        let graph = serde_json::json!({
            "type": "raster_source",
            "params": {"dataset": "temperature", "channel": 0}
        })
        .to_string();
        let query = Query::new(&graph, ResultType::Raster, qrect).unwrap();

        let result = processor.process(&query, false).await;
        let raster = result.as_raster().unwrap();
        assert_eq!(raster.grid.element_type(), ElementType::U8);
        assert!(raster.width() >= 4 && raster.height() >= 4);
    }

    #[tokio::test]
    async fn unknown_operator_type_surfaces_as_error_result() {
        let config = Configuration::from_config(Config::builder().build().unwrap());
        let processor = QueryProcessor::new(
            config,
            RasterBackendRegistry::new(),
            FeatureBackendRegistry::new(),
            OperatorRegistry::new(),
            Arc::new(mapping_backends::NullImageLibrary),
        );
        let qrect = QueryRect::new(
            SpatialRect::new(0.0, 0.0, 1.0, 1.0, CrsId::UNREFERENCED).unwrap(),
            TimeInterval::instant(0),
            TemporalRef::Unreferenced,
            QueryResolution::None,
        );
        let graph = serde_json::json!({"type": "nonexistent"}).to_string();
        let query = Query::new(&graph, ResultType::Raster, qrect).unwrap();

        let result = processor.process(&query, false).await;
        assert!(matches!(result, QueryResult::Error { .. }));
    }

    #[tokio::test]
    async fn open_raster_db_shares_one_handle_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.sqlite");
        {
            let backend = SqliteRasterBackend::open(path.to_str().unwrap(), Some(&descriptor_json()), true).unwrap();
            RasterDB::open(Box::new(backend)).await.unwrap();
        }

        let inner = Config::builder()
            .add_source(File::from_str(
                &format!(
                    "rasterdb.backend = \"local\"\nrasterdb.temperature.location = \"{}\"",
                    path.to_str().unwrap().replace('\\', "\\\\")
                ),
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);

        let mut raster_backends = RasterBackendRegistry::new();
        raster_backends.register("local", sqlite_factory);
        let processor = QueryProcessor::new(
            config,
            raster_backends,
            FeatureBackendRegistry::new(),
            OperatorRegistry::new(),
            Arc::new(mapping_backends::NullImageLibrary),
        );

        let first = processor.open_raster_db("temperature", false).await.unwrap();
        let second = processor.open_raster_db("temperature", false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn open_raster_db_rejects_write_when_cached_handle_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readonly.sqlite");
        {
            let backend = SqliteRasterBackend::open(path.to_str().unwrap(), Some(&descriptor_json()), true).unwrap();
            RasterDB::open(Box::new(backend)).await.unwrap();
        }

        let inner = Config::builder()
            .add_source(File::from_str(
                &format!(
                    "rasterdb.backend = \"local\"\nrasterdb.temperature.location = \"{}\"",
                    path.to_str().unwrap().replace('\\', "\\\\")
                ),
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);

        let mut raster_backends = RasterBackendRegistry::new();
        raster_backends.register("local", sqlite_factory);
        let processor = QueryProcessor::new(
            config,
            raster_backends,
            FeatureBackendRegistry::new(),
            OperatorRegistry::new(),
            Arc::new(mapping_backends::NullImageLibrary),
        );

        let _read_only = processor.open_raster_db("temperature", false).await.unwrap();
        let result = processor.open_raster_db("temperature", true).await;
        assert!(matches!(result, Err(Error::ArgumentError { .. })));
    }

    #[tokio::test]
    async fn raster_source_operator_applies_channel_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transform.sqlite");
        let descriptor = serde_json::json!({
            "coords": {"epsg": 4326, "size": [4, 4], "origin": [0.0, 0.0], "scale": [1.0, 1.0]},
            "channels": [{
                "datatype": "U8", "min": 0.0, "max": 255.0, "nodata": 255.0,
                "transform": {"datatype": "F64", "offset": 0.0, "scale": 2.0}
            }]
        })
        .to_string();
        {
            let backend = SqliteRasterBackend::open(path.to_str().unwrap(), Some(&descriptor), true).unwrap();
            let db = RasterDB::open(Box::new(backend)).await.unwrap();
            let grid = TypedGrid::U8(Grid2D::from_data(4, 4, (0u8..16).collect(), Some(255)));
            db.import(0, grid, false, false, 0, 100, StdHashMap::new(), StdHashMap::new(), 0)
                .await
                .unwrap();
        }

        let inner = Config::builder()
            .add_source(File::from_str(
                &format!(
                    "rasterdb.backend = \"local\"\nrasterdb.scaled.location = \"{}\"",
                    path.to_str().unwrap().replace('\\', "\\\\")
                ),
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);

        let mut raster_backends = RasterBackendRegistry::new();
        raster_backends.register("local", sqlite_factory);
        let mut operator_registry = OperatorRegistry::new();
        operators::register_builtin(&mut operator_registry);
        let processor = QueryProcessor::new(
            config,
            raster_backends,
            FeatureBackendRegistry::new(),
            operator_registry,
            Arc::new(mapping_backends::NullImageLibrary),
        );

        let qrect = QueryRect::new(
            SpatialRect::new(0.0, 0.0, 4.0, 4.0, CrsId::new("EPSG", 4326)).unwrap(),
            TimeInterval::instant(50),
            TemporalRef::Unix,
            QueryResolution::None,
        );
        let graph = serde_json::json!({
            "type": "raster_source",
            "params": {"dataset": "scaled", "channel": 0, "transform": true}
        })
        .to_string();
        let query = Query::new(&graph, ResultType::Raster, qrect).unwrap();

        let result = processor.process(&query, false).await;
        let raster = result.as_raster().unwrap();
        assert_eq!(raster.grid.element_type(), ElementType::F64);
    }

    #[tokio::test]
    async fn external_raster_source_operator_dispatches_through_image_library() {
        let catalog_dir = tempfile::tempdir().unwrap();
        let descriptor = serde_json::json!({
            "path": "/data/worldclim",
            "file_name": "temp_%%%TIME_STRING%%%.tif",
            "time_format": "%Y-%m",
            "time_start": "2000-01-01T00:00:00Z",
            "time_end": null,
            "time_interval": {"unit": "Month", "value": 1},
            "coords": {"crs": "EPSG:4326"},
            "channels": [{"unit": null, "nodata": -9999.0, "path": null, "file_name": null, "channel": null}]
        })
        .to_string();
        std::fs::write(catalog_dir.path().join("worldclim.json"), descriptor).unwrap();

        let inner = Config::builder()
            .add_source(File::from_str(
                &format!(
                    "gdalsource.datasets.path = \"{}\"",
                    catalog_dir.path().to_str().unwrap().replace('\\', "\\\\")
                ),
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);

        let mut operator_registry = OperatorRegistry::new();
        operators::register_builtin(&mut operator_registry);
        let processor = QueryProcessor::new(
            config,
            RasterBackendRegistry::new(),
            FeatureBackendRegistry::new(),
            operator_registry,
            Arc::new(mapping_backends::NullImageLibrary),
        );

        let qrect = QueryRect::new(
            SpatialRect::new(0.0, 0.0, 4.0, 3.0, CrsId::new("EPSG", 4326)).unwrap(),
            TimeInterval::instant(973036800),
            TemporalRef::Unix,
            QueryResolution::None,
        );
        let graph = serde_json::json!({
            "type": "external_raster_source",
            "params": {"dataset": "worldclim", "channel": 0, "datatype": "F32"}
        })
        .to_string();
        let query = Query::new(&graph, ResultType::Raster, qrect).unwrap();

        let result = processor.process(&query, false).await;
        let raster = result.as_raster().unwrap();
        assert_eq!(raster.grid.element_type(), ElementType::F32);
        assert_eq!(raster.width(), 4);
        assert_eq!(raster.height(), 3);
        assert!(raster.time.t1 <= raster.time.t2);
    }
}
