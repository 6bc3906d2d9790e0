use crate::error::{self, Error};
use crate::query_processor::{QueryProcessor, QueryResult};
use crate::raster_db::QueryProfiler;
use async_trait::async_trait;
use mapping_datatypes::primitives::QueryRect;
use serde::Deserialize;
use std::collections::HashMap;

/// One node of an operator graph (spec §6.4): `{type, params, sources}`. The
/// tree is opaque beyond its own shape; `type` is resolved at evaluation
/// time via `OperatorRegistry`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorNode {
    #[serde(rename = "type")]
    pub operator_type: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub sources: Vec<OperatorNode>,
}

impl OperatorNode {
    pub fn parse(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|source| error::Json { source }.build())
    }
}

/// Evaluates one operator graph node against its already-evaluated sources
/// (spec §6.4). Implementations are registered by `type` name, mirroring
/// `RasterBackendRegistry`/`FeatureBackendRegistry`.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn evaluate(
        &self,
        node: &OperatorNode,
        sources: Vec<QueryResult>,
        qrect: &QueryRect,
        processor: &QueryProcessor,
        profiler: &mut QueryProfiler,
    ) -> Result<QueryResult, Error>;
}

pub type OperatorFactory = fn() -> Box<dyn Operator>;

/// Maps an operator graph node's `type` string to an `Operator`
/// implementation: an explicit registry, populated at startup by the
/// binary entry point, same shape as `RasterBackendRegistry`.
#[derive(Default)]
pub struct OperatorRegistry {
    factories: HashMap<String, OperatorFactory>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: OperatorFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Operator>, Error> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => error::ArgumentError {
                reason: format!("unknown operator type {name}"),
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_graph() {
        let json = serde_json::json!({
            "type": "raster_source",
            "params": {"dataset": "temperature", "channel": 0},
            "sources": [
                {"type": "raster_source", "params": {"dataset": "elevation", "channel": 0}, "sources": []}
            ]
        })
        .to_string();
        let node = OperatorNode::parse(&json).unwrap();
        assert_eq!(node.operator_type, "raster_source");
        assert_eq!(node.sources.len(), 1);
        assert_eq!(node.sources[0].operator_type, "raster_source");
    }

    #[test]
    fn unregistered_type_is_an_argument_error() {
        let registry = OperatorRegistry::new();
        let err = registry.instantiate("raster_source").unwrap_err();
        assert!(matches!(err, Error::ArgumentError { .. }));
    }
}
