use crate::error::{self, Error};
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

/// Process-wide, dotted-key configuration table (spec §3.5, §6.6). Load
/// order: `/etc/mapping.conf`, `$HOME/mapping.conf`, `./mapping.conf`, then
/// `MAPPING_*`/`mapping_*` environment variables — later sources override
/// earlier ones.
pub struct Configuration {
    inner: Config,
}

impl Configuration {
    pub fn from_default_paths() -> Result<Self, Error> {
        let mut builder = Config::builder()
            .add_source(File::with_name("/etc/mapping").required(false));
        if let Some(home) = std::env::var_os("HOME") {
            let path = std::path::Path::new(&home).join("mapping");
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder
            .add_source(File::with_name("./mapping").required(false))
            .add_source(Environment::with_prefix("MAPPING").separator("_"))
            .add_source(Environment::with_prefix("mapping").separator("_"));
        let inner = builder.build().map_err(|source| error::ConfigLoad { source }.build())?;
        Ok(Self { inner })
    }

    pub fn from_config(inner: Config) -> Self {
        Self { inner }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        self.inner.get(key).map_err(|source| error::ConfigLoad { source }.build())
    }

    /// Sub-table retrieval: everything under `prefix.*`, e.g. for
    /// backend-specific settings such as `processing.<backend>.*`.
    pub fn get_subtable(&self, prefix: &str) -> Result<std::collections::HashMap<String, String>, Error> {
        self.inner
            .get_table(prefix)
            .map(|table| {
                table
                    .into_iter()
                    .map(|(k, v)| (k, v.to_string()))
                    .collect()
            })
            .map_err(|source| error::ConfigLoad { source }.build())
    }
}

static DEFAULT_CONFIGURATION: OnceLock<Configuration> = OnceLock::new();

/// Lazily initialized process default, constructed once on first access
/// rather than kept as a mutable global.
pub fn default_configuration() -> Result<&'static Configuration, Error> {
    if let Some(config) = DEFAULT_CONFIGURATION.get() {
        return Ok(config);
    }
    let config = Configuration::from_default_paths()?;
    Ok(DEFAULT_CONFIGURATION.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    #[test]
    fn later_source_overrides_earlier() {
        let inner = Config::builder()
            .add_source(File::from_str("data.size = 256", FileFormat::Toml))
            .add_source(File::from_str("data.size = 512", FileFormat::Toml))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);
        assert_eq!(config.get::<i64>("data.size").unwrap(), 512);
    }

    #[test]
    fn get_subtable_collects_nested_keys() {
        let inner = Config::builder()
            .add_source(File::from_str(
                "[processing.local]\nthreads = 4\ncache_mb = 256",
                FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Configuration::from_config(inner);
        let table = config.get_subtable("processing.local").unwrap();
        assert_eq!(table.get("threads").unwrap(), "4");
        assert_eq!(table.get("cache_mb").unwrap(), "256");
    }
}
