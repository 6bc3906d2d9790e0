use crate::config::Configuration;
use crate::error::{self, Error};
use crate::time_snap::{self, TimeInterval as Cadence, TimeUnit};
use mapping_datatypes::primitives::CrsId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const SUFFIX: &str = ".json";

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TimeIntervalDescriptor {
    unit: TimeUnit,
    value: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalCoords {
    crs: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalChannelDescriptor {
    unit: Option<serde_json::Value>,
    nodata: Option<f64>,
    path: Option<String>,
    file_name: Option<String>,
    channel: Option<i32>,
}

/// The external raster collection descriptor (spec §6.2): a time-indexed
/// collection of individual files rather than a tile pyramid, grounded in
/// `original_source/src/util/gdal_source_datasets.cpp`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalRasterDescriptor {
    pub path: String,
    pub file_name: String,
    pub time_format: String,
    pub time_start: String,
    pub time_end: Option<String>,
    time_interval: TimeIntervalDescriptor,
    coords: ExternalCoords,
    channels: Vec<ExternalChannelDescriptor>,
}

impl ExternalRasterDescriptor {
    fn parse_time(s: &str) -> Result<i64, Error> {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp())
            .map_err(|e| error::ConfigError { reason: format!("invalid ISO timestamp {s:?}: {e}") }.build())
    }

    /// Resolves the file path valid at `t_wanted`, applying the time-snap
    /// algorithm (spec §4.5) and substituting the snapped instant into the
    /// `file_name` template.
    pub fn resolve(&self, channel: usize, t_wanted: i64) -> Result<(PathBuf, i64, i64), Error> {
        let per_channel = self.channels.get(channel);
        let path = per_channel
            .and_then(|c| c.path.clone())
            .unwrap_or_else(|| self.path.clone());
        let file_name_template = per_channel
            .and_then(|c| c.file_name.clone())
            .unwrap_or_else(|| self.file_name.clone());

        let cadence = Cadence::new(self.time_interval.unit, self.time_interval.value)?;
        let t_start = Self::parse_time(&self.time_start)?;
        let t_end = self.time_end.as_deref().map(Self::parse_time).transpose()?;
        let (t_begin, t_end_validity) = time_snap::snap(t_start, cadence, t_wanted, t_end)?;

        let file_name = time_snap::format_into_template(t_begin, &self.time_format, &file_name_template);
        Ok((PathBuf::from(path).join(file_name), t_begin, t_end_validity))
    }

    pub fn crs(&self) -> &str {
        &self.coords.crs
    }

    /// Parses the descriptor's `"AUTHORITY:CODE"` crs string (spec §6.2)
    /// into a `CrsId`. Only `EPSG` is recognized; `CrsId::authority` is
    /// `&'static str`, so unknown authorities are rejected rather than leaked.
    pub fn crs_id(&self) -> Result<CrsId, Error> {
        let (authority, code) = self.coords.crs.split_once(':').ok_or_else(|| {
            error::ConfigError {
                reason: format!("malformed crs {:?}, expected AUTHORITY:CODE", self.coords.crs),
            }
            .build()
        })?;
        let code: u32 = code.parse().map_err(|_| {
            error::ConfigError {
                reason: format!("non-numeric crs code in {:?}", self.coords.crs),
            }
            .build()
        })?;
        match authority {
            "EPSG" => Ok(CrsId::new("EPSG", code)),
            other => error::ConfigError {
                reason: format!("unsupported crs authority {other:?}"),
            }
            .fail(),
        }
    }

    pub fn channel_nodata(&self, channel: usize) -> Option<f64> {
        self.channels.get(channel).and_then(|c| c.nodata)
    }
}

/// Lists and loads external raster dataset descriptors from
/// `gdalsource.datasets.path` (spec §4.5).
pub struct ExternalRasterCatalog {
    datasets_path: PathBuf,
}

impl ExternalRasterCatalog {
    pub fn from_configuration(config: &Configuration) -> Result<Self, Error> {
        let path: String = config.get("gdalsource.datasets.path")?;
        Ok(Self { datasets_path: PathBuf::from(path) })
    }

    pub fn new(datasets_path: impl Into<PathBuf>) -> Self {
        Self {
            datasets_path: datasets_path.into(),
        }
    }

    pub fn list_dataset_names(&self) -> Result<Vec<String>, Error> {
        let entries = std::fs::read_dir(&self.datasets_path).map_err(|source| error::Io { source }.build())?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| error::Io { source }.build())?;
            if !entry.file_type().map_err(|source| error::Io { source }.build())?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(stem) = file_name.strip_suffix(SUFFIX) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_descriptor(&self, name: &str) -> Result<ExternalRasterDescriptor, Error> {
        let file_path = self.datasets_path.join(format!("{name}{SUFFIX}"));
        let text = std::fs::read_to_string(&file_path).map_err(|source| error::Io { source }.build())?;
        serde_json::from_str(&text).map_err(|source| error::Json { source }.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_monthly_template() {
        let descriptor = ExternalRasterDescriptor {
            path: "/data/worldclim".to_string(),
            file_name: "temp_%%%TIME_STRING%%%.tif".to_string(),
            time_format: "%Y-%m".to_string(),
            time_start: "2000-01-01T00:00:00Z".to_string(),
            time_end: None,
            time_interval: TimeIntervalDescriptor { unit: TimeUnit::Month, value: 1 },
            coords: ExternalCoords { crs: "EPSG:4326".to_string() },
            channels: vec![],
        };
        let (path, _t_begin, _t_end) = descriptor.resolve(0, 973036800).unwrap();
        assert_eq!(path, PathBuf::from("/data/worldclim/temp_2000-10.tif"));
        assert_eq!(descriptor.crs_id().unwrap(), CrsId::new("EPSG", 4326));
    }

    #[test]
    fn lists_json_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("ignore.txt"), "").unwrap();
        let catalog = ExternalRasterCatalog::new(dir.path());
        let mut names = catalog.list_dataset_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
