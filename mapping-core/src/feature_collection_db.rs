use crate::error::{self, Error};
use mapping_backends::{AnyFeatureCollection, FeatureBackend};
use mapping_datatypes::collections::{DataSetMetaData, LineCollection, PointCollection, PolygonCollection};
use mapping_datatypes::primitives::QueryRect;

/// Registered feature-collection dataset store (spec §4.6), a thin
/// forwarding layer over a pluggable `FeatureBackend`, grounded in
/// `original_source/featurecollectiondb/featurecollectiondb.cpp`.
pub struct FeatureCollectionDB {
    backend: Box<dyn FeatureBackend>,
}

impl FeatureCollectionDB {
    pub fn new(backend: Box<dyn FeatureBackend>) -> Self {
        Self { backend }
    }

    pub async fn load_metadata_for_user(&self, tokens: &[String]) -> Result<Vec<DataSetMetaData>, Error> {
        Ok(self.backend.load_metadata_for_user(tokens).await?)
    }

    pub async fn load_metadata_by_name(&self, owner: &str, name: &str) -> Result<DataSetMetaData, Error> {
        Ok(self.backend.load_metadata_by_name(owner, name).await?)
    }

    pub async fn load_metadata_by_id(&self, id: u64) -> Result<DataSetMetaData, Error> {
        Ok(self.backend.load_metadata_by_id(id).await?)
    }

    pub async fn create_points(&self, owner: &str, name: &str, collection: PointCollection) -> Result<DataSetMetaData, Error> {
        let id = self
            .backend
            .create_collection(owner, name, AnyFeatureCollection::Points(collection))
            .await?;
        self.load_metadata_by_id(id).await
    }

    pub async fn create_lines(&self, owner: &str, name: &str, collection: LineCollection) -> Result<DataSetMetaData, Error> {
        let id = self
            .backend
            .create_collection(owner, name, AnyFeatureCollection::Lines(collection))
            .await?;
        self.load_metadata_by_id(id).await
    }

    pub async fn create_polygons(&self, owner: &str, name: &str, collection: PolygonCollection) -> Result<DataSetMetaData, Error> {
        let id = self
            .backend
            .create_collection(owner, name, AnyFeatureCollection::Polygons(collection))
            .await?;
        self.load_metadata_by_id(id).await
    }

    pub async fn load_points(&self, owner: &str, name: &str, qrect: &QueryRect) -> Result<PointCollection, Error> {
        match self.backend.load_collection(owner, name, qrect).await? {
            AnyFeatureCollection::Points(c) => Ok(c),
            _ => error::ArgumentError {
                reason: format!("dataset ({owner}, {name}) is not a point collection"),
            }
            .fail(),
        }
    }

    pub async fn load_lines(&self, owner: &str, name: &str, qrect: &QueryRect) -> Result<LineCollection, Error> {
        match self.backend.load_collection(owner, name, qrect).await? {
            AnyFeatureCollection::Lines(c) => Ok(c),
            _ => error::ArgumentError {
                reason: format!("dataset ({owner}, {name}) is not a line collection"),
            }
            .fail(),
        }
    }

    pub async fn load_polygons(&self, owner: &str, name: &str, qrect: &QueryRect) -> Result<PolygonCollection, Error> {
        match self.backend.load_collection(owner, name, qrect).await? {
            AnyFeatureCollection::Polygons(c) => Ok(c),
            _ => error::ArgumentError {
                reason: format!("dataset ({owner}, {name}) is not a polygon collection"),
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping_backends::InMemoryFeatureBackend;
    use mapping_datatypes::collections::{Coordinate, MultiPoint};
    use mapping_datatypes::primitives::{CrsId, QueryResolution, SpatialRect, TemporalRef, TimeInterval};
    use std::collections::HashMap;

    fn unreferenced_qrect() -> QueryRect {
        QueryRect::new(
            SpatialRect::new(0.0, 0.0, 2.0, 2.0, CrsId::UNREFERENCED).unwrap(),
            TimeInterval::new(0, 0).unwrap(),
            TemporalRef::Unreferenced,
            QueryResolution::None,
        )
    }

    #[tokio::test]
    async fn create_then_load_points() {
        let db = FeatureCollectionDB::new(Box::new(InMemoryFeatureBackend::new()));
        let mut pc = PointCollection::new(false);
        pc.push(MultiPoint(vec![Coordinate::new(1.0, 1.0)]), HashMap::new(), HashMap::new(), None)
            .unwrap();
        let meta = db.create_points("alice", "spots", pc).await.unwrap();
        assert_eq!(meta.owner, "alice");

        let loaded = db.load_points("alice", "spots", &unreferenced_qrect()).await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn load_lines_against_point_dataset_is_an_argument_error() {
        let db = FeatureCollectionDB::new(Box::new(InMemoryFeatureBackend::new()));
        let pc = PointCollection::new(false);
        db.create_points("alice", "spots", pc).await.unwrap();
        let err = db.load_lines("alice", "spots", &unreferenced_qrect()).await.unwrap_err();
        assert!(matches!(err, Error::ArgumentError { .. }));
    }
}
