use crate::error::Error;
use async_trait::async_trait;
use std::collections::HashMap;

/// A handle to one stored tile, opaque to the caller beyond what
/// `enumerate_tiles` needs to expose (spec §4.1, §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHandle {
    pub rasterid: i64,
    pub zoom: u8,
    pub x_offset: i64,
    pub y_offset: i64,
    pub z_offset: i64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub compression_tag: u8,
}

/// Metadata about the raster record closest to a wanted time (spec §4.1
/// `closest_raster`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosestRaster {
    pub rasterid: i64,
    pub t_start: i64,
    pub t_end: i64,
}

/// Storage abstraction for one `RasterDB` dataset (spec §4.1). Concrete
/// implementations are registered under a name and selected via
/// `rasterdb.backend` rather than being wired up by constructor-registration
/// side effects.
#[async_trait]
pub trait RasterBackend: Send + Sync {
    async fn read_json(&self) -> Result<String, Error>;

    async fn create_raster(
        &self,
        channel: usize,
        t_start: i64,
        t_end: i64,
        attrs_string: &HashMap<String, String>,
        attrs_numeric: &HashMap<String, f64>,
    ) -> Result<i64, Error>;

    async fn link_raster(&self, channel: usize, t_ref: i64, t_start: i64, t_end: i64) -> Result<(), Error>;

    async fn has_tile(&self, rasterid: i64, w: u32, h: u32, d: u32, x: i64, y: i64, z_off: i64, zoom: u8) -> Result<bool, Error>;

    #[allow(clippy::too_many_arguments)]
    async fn write_tile(
        &self,
        rasterid: i64,
        bytes: &[u8],
        w: u32,
        h: u32,
        d: u32,
        x: i64,
        y: i64,
        z_off: i64,
        zoom: u8,
        compression_tag: u8,
    ) -> Result<(), Error>;

    async fn closest_raster(&self, channel: usize, t: i64) -> Result<ClosestRaster, Error>;

    async fn best_zoom(&self, rasterid: i64, zoom: u8) -> Result<u8, Error>;

    async fn enumerate_tiles(
        &self,
        channel: usize,
        rasterid: i64,
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        zoom: u8,
    ) -> Result<Vec<TileHandle>, Error>;

    async fn read_tile(&self, handle: &TileHandle) -> Result<Vec<u8>, Error>;

    async fn read_attributes(&self, rasterid: i64) -> Result<(HashMap<String, String>, HashMap<String, f64>), Error>;

    fn is_writable(&self) -> bool;
}

/// Constructs a named `RasterBackend` instance, e.g. `local` ->
/// `SqliteRasterBackend::open`. Populated at startup by the binary entry
/// point rather than via process-init side effects.
pub type RasterBackendFactory = fn(connection_string: &str, writable: bool) -> Result<Box<dyn RasterBackend>, Error>;

#[derive(Default)]
pub struct RasterBackendRegistry {
    factories: HashMap<String, RasterBackendFactory>,
}

impl RasterBackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: RasterBackendFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn open(&self, name: &str, connection_string: &str, writable: bool) -> Result<Box<dyn RasterBackend>, Error> {
        match self.factories.get(name) {
            Some(factory) => factory(connection_string, writable),
            None => crate::error::UnknownBackend { name: name.to_string() }.fail(),
        }
    }
}
