use super::data_description::{DataDescription, ElementType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A literal value or a reference into a raster's numeric attribute map,
/// used for `offset`/`scale` in `ChannelTransform` (spec §3.2, §6.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformParam {
    Literal(f64),
    FromAttribute(String),
}

impl TransformParam {
    /// Resolves against a raster's numeric attribute map, falling back to
    /// `default` if the referenced attribute is absent (spec §8.3).
    pub fn resolve(&self, attrs: &HashMap<String, f64>, default: f64) -> f64 {
        match self {
            TransformParam::Literal(v) => *v,
            TransformParam::FromAttribute(name) => attrs.get(name).copied().unwrap_or(default),
        }
    }
}

/// Per-sample affine transform applied on read: `out = in * scale + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTransform {
    pub element_type: ElementType,
    pub offset: TransformParam,
    pub scale: TransformParam,
}

impl ChannelTransform {
    pub fn offset(&self, attrs: &HashMap<String, f64>) -> f64 {
        self.offset.resolve(attrs, 0.0)
    }

    pub fn scale(&self, attrs: &HashMap<String, f64>) -> f64 {
        self.scale.resolve(attrs, 1.0)
    }

    /// The `DataDescription` of the channel's output once transformed.
    pub fn transformed_data_description(
        &self,
        source: &DataDescription,
        attrs: &HashMap<String, f64>,
    ) -> DataDescription {
        let offset = self.offset(attrs);
        let scale = self.scale(attrs);
        let min = source.min * scale + offset;
        let max = source.max * scale + offset;
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let dd = DataDescription::new(self.element_type, min, max).expect("transformed min <= max by construction");
        if source.has_no_data {
            dd.with_no_data(source.no_data * scale + offset)
        } else {
            dd
        }
    }
}

/// A single band of a raster dataset: its value range plus an optional
/// read-time transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterChannel {
    pub dd: DataDescription,
    pub transform: Option<ChannelTransform>,
}

impl RasterChannel {
    pub fn new(dd: DataDescription) -> Self {
        Self { dd, transform: None }
    }

    pub fn with_transform(mut self, transform: ChannelTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_param_falls_back_to_default() {
        let attrs = HashMap::new();
        let p = TransformParam::FromAttribute("missing".to_string());
        assert_eq!(p.resolve(&attrs, 0.0), 0.0);
        assert_eq!(p.resolve(&attrs, 1.0), 1.0);
    }

    #[test]
    fn transformed_data_description_keeps_no_data_absent_when_source_has_none() {
        let source = DataDescription::new(ElementType::U8, 0.0, 255.0).unwrap();
        assert!(!source.has_no_data);
        let transform = ChannelTransform {
            element_type: ElementType::F64,
            offset: TransformParam::Literal(0.0),
            scale: TransformParam::Literal(2.0),
        };
        let transformed = transform.transformed_data_description(&source, &HashMap::new());
        assert!(!transformed.has_no_data);
    }

    #[test]
    fn transformed_data_description_carries_no_data_when_source_has_one() {
        let source = DataDescription::new(ElementType::U8, 0.0, 255.0).unwrap().with_no_data(255.0);
        let transform = ChannelTransform {
            element_type: ElementType::F64,
            offset: TransformParam::Literal(1.0),
            scale: TransformParam::Literal(2.0),
        };
        let transformed = transform.transformed_data_description(&source, &HashMap::new());
        assert!(transformed.has_no_data);
        assert_eq!(transformed.no_data, 255.0 * 2.0 + 1.0);
    }
}
