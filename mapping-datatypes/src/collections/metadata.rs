use super::geometry::GeometryKind;
use super::unit::Unit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Describes a registered feature collection dataset (spec §3.4, wire form
/// §6.5). `(owner, name)` is unique across a `FeatureCollectionDB`; that
/// invariant is enforced by the backend, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetMetaData {
    pub dataset_id: u64,
    pub owner: String,
    pub name: String,
    pub kind: GeometryKind,
    pub numeric_attrs: HashMap<String, Unit>,
    pub textual_attrs: HashMap<String, Unit>,
    pub has_time: bool,
}

impl DataSetMetaData {
    pub fn new(dataset_id: u64, owner: impl Into<String>, name: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            dataset_id,
            owner: owner.into(),
            name: name.into(),
            kind,
            numeric_attrs: HashMap::new(),
            textual_attrs: HashMap::new(),
            has_time: false,
        }
    }

    pub fn has_numeric_attr(&self, name: &str) -> bool {
        self.numeric_attrs.contains_key(name)
    }

    pub fn has_textual_attr(&self, name: &str) -> bool {
        self.textual_attrs.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_dataset_has_no_attributes() {
        let meta = DataSetMetaData::new(1, "alice", "parks", GeometryKind::Polygons);
        assert!(!meta.has_time);
        assert!(meta.numeric_attrs.is_empty());
    }
}
