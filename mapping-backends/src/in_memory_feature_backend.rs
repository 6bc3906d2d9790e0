use crate::error::{self, Error};
use crate::feature_backend::{AnyFeatureCollection, FeatureBackend};
use async_trait::async_trait;
use mapping_datatypes::collections::{DataSetMetaData, GeometryKind};
use mapping_datatypes::primitives::QueryRect;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// In-memory `FeatureBackend`: a process-local store useful for tests
/// and small deployments, with no persistence.
#[derive(Default)]
pub struct InMemoryFeatureBackend {
    next_id: AtomicU64,
    datasets: RwLock<HashMap<u64, (DataSetMetaData, AnyFeatureCollection)>>,
}

impl InMemoryFeatureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_by_name(&self, owner: &str, name: &str) -> Option<u64> {
        self.datasets
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|(_, (meta, _))| meta.owner == owner && meta.name == name)
            .map(|(id, _)| *id)
    }
}

#[async_trait]
impl FeatureBackend for InMemoryFeatureBackend {
    async fn load_metadata_for_user(&self, tokens: &[String]) -> Result<Vec<DataSetMetaData>, Error> {
        let datasets = self.datasets.read().expect("lock poisoned");
        Ok(datasets
            .iter()
            .filter(|(id, _)| tokens.iter().any(|t| t == &format!("data.featurecollectiondb_source.{id}")))
            .map(|(_, (meta, _))| meta.clone())
            .collect())
    }

    async fn load_metadata_by_name(&self, owner: &str, name: &str) -> Result<DataSetMetaData, Error> {
        let id = self
            .find_by_name(owner, name)
            .ok_or_else(|| error::UnknownDataset { owner: owner.to_string(), name: name.to_string() }.build())?;
        self.load_metadata_by_id(id).await
    }

    async fn load_metadata_by_id(&self, id: u64) -> Result<DataSetMetaData, Error> {
        self.datasets
            .read()
            .expect("lock poisoned")
            .get(&id)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| error::UnknownDataset { owner: String::new(), name: id.to_string() }.build())
    }

    async fn create_collection(&self, owner: &str, name: &str, collection: AnyFeatureCollection) -> Result<u64, Error> {
        if self.find_by_name(owner, name).is_some() {
            return error::DuplicateDataset { owner: owner.to_string(), name: name.to_string() }.fail();
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let kind = match &collection {
            AnyFeatureCollection::Points(_) => GeometryKind::Points,
            AnyFeatureCollection::Lines(_) => GeometryKind::Lines,
            AnyFeatureCollection::Polygons(_) => GeometryKind::Polygons,
        };
        let meta = DataSetMetaData::new(id, owner, name, kind);
        self.datasets.write().expect("lock poisoned").insert(id, (meta, collection));
        Ok(id)
    }

    async fn load_collection(&self, owner: &str, name: &str, qrect: &QueryRect) -> Result<AnyFeatureCollection, Error> {
        let id = self
            .find_by_name(owner, name)
            .ok_or_else(|| error::UnknownDataset { owner: owner.to_string(), name: name.to_string() }.build())?;
        let datasets = self.datasets.read().expect("lock poisoned");
        let (_, collection) = datasets.get(&id).expect("id just looked up");
        Ok(match collection {
            AnyFeatureCollection::Points(c) => AnyFeatureCollection::Points(c.filter_by_query(&qrect.spatial, Some(&qrect.time))),
            AnyFeatureCollection::Lines(c) => AnyFeatureCollection::Lines(c.filter_by_query(&qrect.spatial, Some(&qrect.time))),
            AnyFeatureCollection::Polygons(c) => AnyFeatureCollection::Polygons(c.filter_by_query(&qrect.spatial, Some(&qrect.time))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping_datatypes::collections::{Coordinate, MultiPoint, PointCollection};
    use mapping_datatypes::primitives::{CrsId, SpatialRect, TemporalRef, TimeInterval};
    use std::collections::HashMap as Map;

    #[tokio::test]
    async fn create_and_load_round_trips_order() {
        let backend = InMemoryFeatureBackend::new();
        let mut pc = PointCollection::new(true);
        pc.push(
            MultiPoint(vec![Coordinate::new(0.0, 0.0)]),
            Map::new(),
            Map::new(),
            Some(TimeInterval::new(2, 4).unwrap()),
        )
        .unwrap();
        pc.push(
            MultiPoint(vec![Coordinate::new(100.0, 100.0)]),
            Map::new(),
            Map::new(),
            Some(TimeInterval::new(8, 16).unwrap()),
        )
        .unwrap();

        backend
            .create_collection("alice", "spots", AnyFeatureCollection::Points(pc))
            .await
            .unwrap();

        let qrect = QueryRect::new(
            SpatialRect::new(-1.0, -1.0, 1.0, 1.0, CrsId::UNREFERENCED).unwrap(),
            TimeInterval::new(0, 100).unwrap(),
            TemporalRef::Unreferenced,
            mapping_datatypes::primitives::QueryResolution::None,
        );
        let loaded = backend.load_collection("alice", "spots", &qrect).await.unwrap();
        match loaded {
            AnyFeatureCollection::Points(c) => assert_eq!(c.len(), 1),
            _ => panic!("expected points"),
        }
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let backend = InMemoryFeatureBackend::new();
        let pc = PointCollection::new(false);
        backend
            .create_collection("alice", "spots", AnyFeatureCollection::Points(pc))
            .await
            .unwrap();
        let pc2 = PointCollection::new(false);
        let err = backend
            .create_collection("alice", "spots", AnyFeatureCollection::Points(pc2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDataset { .. }));
    }
}
