use crate::error::{self, Error};
use mapping_backends::{CodecRegistry, RasterBackend};
use mapping_datatypes::primitives::{CrsId, QueryRect, TimeInterval};
use mapping_datatypes::raster::{
    max_pyramid_zoom, tile_windows, ChannelTransform, DataDescription, ElementType, GridCrs, Raster, RasterChannel,
    TransformParam, TypedGrid, DEFAULT_TILE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Accumulates bytes read through a backend during a single query, handed
/// back to the caller as part of the query result (spec §4.4 step 10, §4.7).
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryProfiler {
    io_cost: u64,
}

impl QueryProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_io_cost(&mut self, bytes: u64) {
        self.io_cost += bytes;
    }

    pub fn io_cost(&self) -> u64 {
        self.io_cost
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CoordsDescriptor {
    epsg: u32,
    size: [u64; 2],
    origin: [f64; 2],
    scale: [f64; 2],
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TransformDescriptor {
    datatype: String,
    offset: TransformParam,
    scale: TransformParam,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ChannelDescriptor {
    datatype: String,
    min: f64,
    max: f64,
    nodata: Option<f64>,
    transform: Option<TransformDescriptor>,
}

/// The raster dataset JSON descriptor (spec §6.1), parsed once per
/// `RasterDB::open`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RasterDescriptor {
    coords: CoordsDescriptor,
    channels: Vec<ChannelDescriptor>,
}

fn parse_descriptor(json: &str) -> Result<(GridCrs, Vec<RasterChannel>), Error> {
    let descriptor: RasterDescriptor = serde_json::from_str(json).map_err(|source| error::Json { source }.build())?;
    if descriptor.channels.is_empty() {
        return error::ConfigError {
            reason: "raster descriptor must declare at least one channel".to_string(),
        }
        .fail();
    }
    let crs = GridCrs::new(
        CrsId::new("EPSG", descriptor.coords.epsg),
        2,
        [descriptor.coords.size[0], descriptor.coords.size[1], 0],
        [descriptor.coords.origin[0], descriptor.coords.origin[1], 0.0],
        [descriptor.coords.scale[0], descriptor.coords.scale[1], 0.0],
    )?;
    let channels = descriptor
        .channels
        .into_iter()
        .map(|c| {
            let element_type = ElementType::from_str(&c.datatype)?;
            let mut dd = DataDescription::new(element_type, c.min, c.max)?;
            if let Some(nodata) = c.nodata {
                dd = dd.with_no_data(nodata);
            }
            let mut channel = RasterChannel::new(dd);
            if let Some(t) = c.transform {
                let transform_type = ElementType::from_str(&t.datatype)?;
                channel = channel.with_transform(ChannelTransform {
                    element_type: transform_type,
                    offset: t.offset,
                    scale: t.scale,
                });
            }
            Ok(channel)
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Ok((crs, channels))
}

/// A tiled raster dataset: the pyramid-build import pipeline and the
/// query/load path (spec §4.3, §4.4), grounded in
/// `original_source/mapping/rasterdb/rasterdb.cpp`'s `RasterDB::import`
/// and `RasterDB::load`/`query`.
pub struct RasterDB {
    backend: Box<dyn RasterBackend>,
    codecs: CodecRegistry,
    crs: GridCrs,
    channels: Vec<RasterChannel>,
}

impl RasterDB {
    pub async fn open(backend: Box<dyn RasterBackend>) -> Result<Self, Error> {
        let json = backend.read_json().await?;
        let (crs, channels) = parse_descriptor(&json)?;
        Ok(Self {
            backend,
            codecs: CodecRegistry::new(),
            crs,
            channels,
        })
    }

    pub fn crs(&self) -> &GridCrs {
        &self.crs
    }

    pub fn is_writable(&self) -> bool {
        self.backend.is_writable()
    }

    pub fn channel(&self, index: usize) -> Result<&RasterChannel, Error> {
        self.channels.get(index).ok_or_else(|| {
            error::ArgumentError {
                reason: format!("no channel {index}"),
            }
            .build()
        })
    }

    fn dataset_flip(&self) -> (bool, bool) {
        (self.crs.scale[0] < 0.0, self.crs.scale[1] < 0.0)
    }

    /// Imports a source image into `channel` as a new time-slice record,
    /// building the full tile pyramid (spec §4.3).
    #[allow(clippy::too_many_arguments)]
    pub async fn import(
        &self,
        channel: usize,
        mut grid: TypedGrid,
        source_flip_x: bool,
        source_flip_y: bool,
        t_start: i64,
        t_end: i64,
        attrs_string: HashMap<String, String>,
        attrs_numeric: HashMap<String, f64>,
        compression_tag: u8,
    ) -> Result<i64, Error> {
        if !self.backend.is_writable() {
            return error::ReadOnly.fail();
        }
        let channel_desc = self.channel(channel)?;

        let (crs_flip_x, crs_flip_y) = self.dataset_flip();
        let need_flip_x = source_flip_x != crs_flip_x;
        let need_flip_y = source_flip_y != crs_flip_y;
        if need_flip_x || need_flip_y {
            grid.flip(need_flip_x, need_flip_y);
        }

        if channel_desc.dd.has_no_data {
            grid.adopt_no_data_if_absent(channel_desc.dd.no_data);
        }

        let rasterid = self
            .backend
            .create_raster(channel, t_start, t_end, &attrs_string, &attrs_numeric)
            .await?;

        let codec = self.codecs.get(compression_tag)?;
        let max_zoom = max_pyramid_zoom(grid.width() as u32, grid.height() as u32, DEFAULT_TILE_SIZE);

        let mut scaled = grid;
        for zoom in 0..=max_zoom {
            let width = scaled.width() as u32;
            let height = scaled.height() as u32;
            let factor = 1i64 << zoom;
            for window in tile_windows(width, height, DEFAULT_TILE_SIZE) {
                let base_x = window.x_offset as i64 * factor;
                let base_y = window.y_offset as i64 * factor;
                let already = self
                    .backend
                    .has_tile(rasterid, window.width, window.height, 1, base_x, base_y, 0, zoom)
                    .await?;
                if already {
                    continue;
                }
                let tile = scaled.crop(window.x_offset as i64, window.y_offset as i64, window.width as usize, window.height as usize);
                let encoded = codec.encode(&tile.to_bytes());
                self.backend
                    .write_tile(
                        rasterid,
                        &encoded,
                        window.width,
                        window.height,
                        1,
                        base_x,
                        base_y,
                        0,
                        zoom,
                        codec.tag(),
                    )
                    .await?;
            }
            if zoom < max_zoom {
                scaled = scaled.downscale_2x();
            }
        }

        Ok(rasterid)
    }

    /// Records that `[t_start, t_end]` of `channel` shares storage with the
    /// raster closest to `t_ref` (spec §4.3 "Linking").
    pub async fn link_raster(&self, channel: usize, t_ref: i64, t_start: i64, t_end: i64) -> Result<(), Error> {
        if !self.backend.is_writable() {
            return error::ReadOnly.fail();
        }
        self.backend.link_raster(channel, t_ref, t_start, t_end).await?;
        Ok(())
    }

    /// Evaluates a `QueryRect` against `channel`, optionally applying the
    /// channel's read-time transform (spec §4.4).
    pub async fn query(
        &self,
        qrect: &QueryRect,
        channel: usize,
        transform: bool,
        profiler: &mut QueryProfiler,
    ) -> Result<Raster, Error> {
        if qrect.crs() != self.crs.crs {
            return error::CrsMismatch.fail();
        }
        let channel_desc = self.channel(channel)?;

        let px1 = self.crs.world_to_pixel_x(qrect.spatial.x1);
        let px2 = self.crs.world_to_pixel_x(qrect.spatial.x2);
        let py1 = self.crs.world_to_pixel_y(qrect.spatial.y1);
        let py2 = self.crs.world_to_pixel_y(qrect.spatial.y2);
        let wx1 = px1.min(px2).floor() as i64;
        let wx2 = px1.max(px2).ceil() as i64 + 1;
        let wy1 = py1.min(py2).floor() as i64;
        let wy2 = py1.max(py2).ceil() as i64 + 1;
        let window_width = (wx2 - wx1).max(1);
        let window_height = (wy2 - wy1).max(1);

        let (xres, yres) = qrect
            .resolution
            .pixels()
            .map(|(x, y)| (x as i64, y as i64))
            .unwrap_or((window_width, window_height));

        let mut zoom: u8 = 0;
        let mut pw = window_width;
        let mut ph = window_height;
        while pw > 2 * xres && ph > 2 * yres {
            zoom += 1;
            pw >>= 1;
            ph >>= 1;
            if zoom >= 31 {
                break;
            }
        }

        let closest = self.backend.closest_raster(channel, qrect.time.t1).await?;
        let zoom = self.backend.best_zoom(closest.rasterid, zoom).await?;
        let factor = 1i64 << zoom;

        let out_width = ((window_width + factor - 1) / factor).max(1) as usize;
        let out_height = ((window_height + factor - 1) / factor).max(1) as usize;

        let (attrs_string, attrs_numeric) = self.backend.read_attributes(closest.rasterid).await?;

        let (result_dd, apply_transform) = if transform && channel_desc.transform.is_some() {
            let t = channel_desc.transform.as_ref().expect("checked above");
            (t.transformed_data_description(&channel_desc.dd, &attrs_numeric), true)
        } else {
            (channel_desc.dd, false)
        };

        let result_no_data = if result_dd.has_no_data { Some(result_dd.no_data) } else { None };
        let mut result = TypedGrid::new(result_dd.element_type, out_width, out_height, result_no_data);
        if let Some(nd) = result_no_data {
            result.clear_f64(nd);
        }

        let handles = self
            .backend
            .enumerate_tiles(channel, closest.rasterid, wx1, wy1, wx2, wy2, zoom)
            .await?;
        if handles.is_empty() {
            return error::NoTiles.fail();
        }

        for handle in &handles {
            let bytes = self.backend.read_tile(handle).await?;
            profiler.add_io_cost(bytes.len() as u64);
            let codec = self.codecs.get(handle.compression_tag)?;
            let decoded = codec.decode(&bytes)?;
            let source_no_data = if channel_desc.dd.has_no_data {
                Some(channel_desc.dd.no_data)
            } else {
                None
            };
            let tile_grid = TypedGrid::from_bytes(
                channel_desc.dd.element_type,
                handle.width as usize,
                handle.height as usize,
                &decoded,
                source_no_data,
            );

            let dest_x = (handle.x_offset - wx1).div_euclid(factor);
            let dest_y = (handle.y_offset - wy1).div_euclid(factor);

            if apply_transform {
                let t = channel_desc.transform.as_ref().expect("checked above");
                let offset = t.offset(&attrs_numeric);
                let scale = t.scale(&attrs_numeric);
                result.blit_transformed(&tile_grid, dest_x, dest_y, offset, scale);
            } else if !result.blit_same_type(&tile_grid, dest_x, dest_y) {
                return error::MustNotHappen {
                    reason: "stored tile element type does not match the channel's declared type".to_string(),
                }
                .fail();
            }
        }

        let (flip_x, flip_y) = self.dataset_flip();
        if flip_x || flip_y {
            result.flip(flip_x, flip_y);
        }

        let result_crs = GridCrs::new(
            self.crs.crs,
            2,
            [out_width as u64, out_height as u64, 0],
            [self.crs.pixel_to_world_x(wx1 as f64), self.crs.pixel_to_world_y(wy1 as f64), 0.0],
            [self.crs.scale[0] * factor as f64, self.crs.scale[1] * factor as f64, 0.0],
        )?;

        Ok(Raster {
            grid: result,
            grid_crs: result_crs,
            time: TimeInterval::new(closest.t_start, closest.t_end)?,
            channel_index: channel,
            attributes_string: attrs_string,
            attributes_numeric: attrs_numeric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping_backends::SqliteRasterBackend;
    use mapping_datatypes::primitives::{QueryResolution, SpatialRect, TemporalRef};
    use mapping_datatypes::raster::Grid2D;

    fn descriptor_json() -> String {
        serde_json::json!({
            "coords": {"epsg": 4326, "size": [4, 4], "origin": [0.0, 0.0], "scale": [1.0, 1.0]},
            "channels": [{"datatype": "U8", "min": 0.0, "max": 255.0, "nodata": 255.0}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn import_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let backend = SqliteRasterBackend::open(path.to_str().unwrap(), Some(&descriptor_json()), true).unwrap();
        let db = RasterDB::open(Box::new(backend)).await.unwrap();

        let grid = TypedGrid::U8(Grid2D::from_data(4, 4, (0u8..16).collect(), Some(255)));
        let rasterid = db
            .import(0, grid, false, false, 0, 100, HashMap::new(), HashMap::new(), 0)
            .await
            .unwrap();
        assert_eq!(rasterid, 1);

        let qrect = QueryRect::new(
            SpatialRect::new(0.0, 0.0, 4.0, 4.0, CrsId::new("EPSG", 4326)).unwrap(),
            TimeInterval::instant(50),
            TemporalRef::Unix,
            QueryResolution::None,
        );
        let mut profiler = QueryProfiler::new();
        let raster = db.query(&qrect, 0, false, &mut profiler).await.unwrap();
        assert!(raster.width() >= 4 && raster.height() >= 4);
        assert!(profiler.io_cost() > 0);
    }

    #[tokio::test]
    async fn query_against_read_only_handle_with_no_tiles_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.sqlite");
        let backend = SqliteRasterBackend::open(path.to_str().unwrap(), Some(&descriptor_json()), true).unwrap();
        let db = RasterDB::open(Box::new(backend)).await.unwrap();
        let grid = TypedGrid::U8(Grid2D::from_data(4, 4, vec![1; 16], Some(255)));
        db.import(0, grid, false, false, 0, 100, HashMap::new(), HashMap::new(), 0).await.unwrap();

        let qrect = QueryRect::new(
            SpatialRect::new(0.0, 0.0, 4.0, 4.0, CrsId::new("EPSG", 4326)).unwrap(),
            TimeInterval::instant(500),
            TemporalRef::Unix,
            QueryResolution::None,
        );
        let mut profiler = QueryProfiler::new();
        let err = db.query(&qrect, 0, false, &mut profiler).await.unwrap_err();
        assert!(matches!(err, Error::BackendError { .. }));
    }
}
