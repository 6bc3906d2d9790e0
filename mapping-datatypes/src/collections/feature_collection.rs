use super::geometry::{Geometry, MultiLineString, MultiPoint, MultiPolygon};
use crate::error::{Error, FeatureTimeMismatch};
use crate::primitives::{SpatialRect, TimeInterval};
use snafu::ensure;
use std::collections::HashMap;

/// A set of features of one geometry kind: the geometries themselves, their
/// per-feature numeric/textual attribute columns, and an optional
/// per-feature validity interval. Features are ordered by insertion
/// (`feature_index` is simply the position in `geometries`), which is the
/// order `to_geo_json` and query results preserve (spec §3.4, §8.1
/// invariant 6).
#[derive(Debug, Clone)]
pub struct FeatureCollection<G> {
    geometries: Vec<G>,
    numeric_attributes: HashMap<String, Vec<f64>>,
    textual_attributes: HashMap<String, Vec<String>>,
    time_intervals: Option<Vec<TimeInterval>>,
}

pub type PointCollection = FeatureCollection<MultiPoint>;
pub type LineCollection = FeatureCollection<MultiLineString>;
pub type PolygonCollection = FeatureCollection<MultiPolygon>;

impl<G: Geometry + Clone> FeatureCollection<G> {
    pub fn new(has_time: bool) -> Self {
        Self {
            geometries: Vec::new(),
            numeric_attributes: HashMap::new(),
            textual_attributes: HashMap::new(),
            time_intervals: has_time.then(Vec::new),
        }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn geometries(&self) -> &[G] {
        &self.geometries
    }

    pub fn time_intervals(&self) -> Option<&[TimeInterval]> {
        self.time_intervals.as_deref()
    }

    pub fn numeric_column(&self, name: &str) -> Option<&[f64]> {
        self.numeric_attributes.get(name).map(Vec::as_slice)
    }

    pub fn textual_column(&self, name: &str) -> Option<&[String]> {
        self.textual_attributes.get(name).map(Vec::as_slice)
    }

    /// Appends one feature. `numeric`/`textual` must supply a value for
    /// every column already present in the collection (spec §3.4: every
    /// attribute array has one entry per feature); `time` must be `Some`
    /// iff the collection was created `has_time`.
    pub fn push(
        &mut self,
        geometry: G,
        numeric: HashMap<String, f64>,
        textual: HashMap<String, String>,
        time: Option<TimeInterval>,
    ) -> Result<(), Error> {
        ensure!(time.is_some() == self.time_intervals.is_some(), FeatureTimeMismatch);
        self.geometries.push(geometry);
        for (name, values) in self.numeric_attributes.iter_mut() {
            values.push(*numeric.get(name).unwrap_or(&f64::NAN));
        }
        for (name, values) in self.textual_attributes.iter_mut() {
            values.push(textual.get(name).cloned().unwrap_or_default());
        }
        if let Some(intervals) = &mut self.time_intervals {
            intervals.push(time.expect("checked above"));
        }
        Ok(())
    }

    /// Registers a new numeric attribute column, backfilling existing
    /// features with NaN.
    pub fn add_numeric_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.numeric_attributes
            .entry(name)
            .or_insert_with(|| vec![f64::NAN; self.geometries.len()]);
    }

    pub fn add_textual_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.textual_attributes
            .entry(name)
            .or_insert_with(|| vec![String::new(); self.geometries.len()]);
    }

    /// Returns the subset of features whose geometry envelope intersects
    /// `rect` and, when both the collection and `time` carry a temporal
    /// component, whose interval overlaps `time` (spec §4.6). Relative
    /// feature order is preserved.
    pub fn filter_by_query(&self, rect: &SpatialRect, time: Option<&TimeInterval>) -> Self {
        let keep: Vec<bool> = (0..self.len())
            .map(|i| {
                let spatial_ok = self.geometries[i].envelope_intersects(rect.x1, rect.y1, rect.x2, rect.y2);
                let temporal_ok = match (&self.time_intervals, time) {
                    (Some(intervals), Some(query_time)) => intervals[i].overlaps(query_time),
                    _ => true,
                };
                spatial_ok && temporal_ok
            })
            .collect();
        self.filter(&keep)
    }

    /// Keeps only the features for which `mask[i]` is true, preserving
    /// order.
    pub fn filter(&self, mask: &[bool]) -> Self {
        let geometries = select(&self.geometries, mask);
        let numeric_attributes = self
            .numeric_attributes
            .iter()
            .map(|(k, v)| (k.clone(), select(v, mask)))
            .collect();
        let textual_attributes = self
            .textual_attributes
            .iter()
            .map(|(k, v)| (k.clone(), select(v, mask)))
            .collect();
        let time_intervals = self.time_intervals.as_ref().map(|v| select(v, mask));
        Self {
            geometries,
            numeric_attributes,
            textual_attributes,
            time_intervals,
        }
    }
}

fn select<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter_map(|(v, keep)| keep.then(|| v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::geometry::Coordinate;

    #[test]
    fn push_and_filter_preserve_order() {
        let mut pc = PointCollection::new(false);
        pc.add_numeric_column("height");
        pc.push(
            MultiPoint(vec![Coordinate::new(0.0, 0.0)]),
            HashMap::from([("height".to_string(), 1.0)]),
            HashMap::new(),
            None,
        )
        .unwrap();
        pc.push(
            MultiPoint(vec![Coordinate::new(100.0, 100.0)]),
            HashMap::from([("height".to_string(), 2.0)]),
            HashMap::new(),
            None,
        )
        .unwrap();

        let rect = SpatialRect::new(-1.0, -1.0, 1.0, 1.0, crate::primitives::CrsId::UNREFERENCED).unwrap();
        let filtered = pc.filter_by_query(&rect, None);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.numeric_column("height"), Some(&[1.0][..]));
    }

    #[test]
    fn rejects_time_mismatch() {
        let mut pc = PointCollection::new(true);
        let err = pc
            .push(MultiPoint(vec![Coordinate::new(0.0, 0.0)]), HashMap::new(), HashMap::new(), None)
            .unwrap_err();
        assert!(matches!(err, Error::FeatureTimeMismatch));
    }
}
