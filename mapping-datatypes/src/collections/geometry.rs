use serde::{Deserialize, Serialize};

/// A single 2-D coordinate in the dataset's declared CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Common behavior of the three supported feature geometry kinds: a
/// bounding envelope, used to evaluate the spatial half of a query
/// predicate (spec §4.6, §8.1 invariant 6).
pub trait Geometry {
    /// `(x1, y1, x2, y2)`, or `None` for an empty geometry.
    fn envelope(&self) -> Option<(f64, f64, f64, f64)>;

    fn envelope_intersects(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        match self.envelope() {
            Some((ex1, ey1, ex2, ey2)) => ex1 <= x2 && ex2 >= x1 && ey1 <= y2 && ey2 >= y1,
            None => false,
        }
    }
}

fn envelope_of<'a>(points: impl Iterator<Item = &'a Coordinate>) -> Option<(f64, f64, f64, f64)> {
    let mut it = points;
    let first = it.next()?;
    let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x, first.y);
    for p in it {
        x1 = x1.min(p.x);
        y1 = y1.min(p.y);
        x2 = x2.max(p.x);
        y2 = y2.max(p.y);
    }
    Some((x1, y1, x2, y2))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPoint(pub Vec<Coordinate>);

impl Geometry for MultiPoint {
    fn envelope(&self) -> Option<(f64, f64, f64, f64)> {
        envelope_of(self.0.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLineString(pub Vec<Vec<Coordinate>>);

impl Geometry for MultiLineString {
    fn envelope(&self) -> Option<(f64, f64, f64, f64)> {
        envelope_of(self.0.iter().flatten())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon(pub Vec<Vec<Vec<Coordinate>>>);

impl Geometry for MultiPolygon {
    fn envelope(&self) -> Option<(f64, f64, f64, f64)> {
        envelope_of(self.0.iter().flatten().flatten())
    }
}

/// Distinguishes which concrete geometry kind a `DataSetMetaData` /
/// `FeatureCollection` carries (spec §3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Points,
    Lines,
    Polygons,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_point_envelope() {
        let mp = MultiPoint(vec![Coordinate::new(0.0, 0.0), Coordinate::new(2.0, 3.0)]);
        assert_eq!(mp.envelope(), Some((0.0, 0.0, 2.0, 3.0)));
        assert!(mp.envelope_intersects(1.0, 1.0, 5.0, 5.0));
        assert!(!mp.envelope_intersects(10.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn empty_geometry_has_no_envelope() {
        let mp = MultiPoint(vec![]);
        assert_eq!(mp.envelope(), None);
        assert!(!mp.envelope_intersects(0.0, 0.0, 1.0, 1.0));
    }
}
