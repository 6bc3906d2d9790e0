use super::grid_crs::GridCrs;
use super::TypedGrid;
use crate::primitives::{QueryRect, TimeInterval};
use std::collections::HashMap;

/// A raster value produced by a query: a typed pixel grid plus the
/// geo-referencing and attribute metadata needed to interpret it
/// (spec §3.3, §4.4 step 9).
#[derive(Debug, Clone)]
pub struct Raster {
    pub grid: TypedGrid,
    /// Grid describing this raster's own origin/scale/crs (the query
    /// window's grid, not the dataset's full grid).
    pub grid_crs: GridCrs,
    pub time: TimeInterval,
    pub channel_index: usize,
    pub attributes_string: HashMap<String, String>,
    pub attributes_numeric: HashMap<String, f64>,
}

impl Raster {
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Crops the loose, tile-aligned result down to `qrect`'s exact spatial
    /// extent (spec §4.7 "fit-to-query-rect" accessor mode).
    pub fn fit_to_query_rect(&self, qrect: &QueryRect) -> Raster {
        let px1 = self.grid_crs.world_to_pixel_x(qrect.spatial.x1);
        let px2 = self.grid_crs.world_to_pixel_x(qrect.spatial.x2);
        let py1 = self.grid_crs.world_to_pixel_y(qrect.spatial.y1);
        let py2 = self.grid_crs.world_to_pixel_y(qrect.spatial.y2);

        let width = self.grid.width() as i64;
        let height = self.grid.height() as i64;
        let x1 = (px1.min(px2).round() as i64).clamp(0, width);
        let x2 = (px1.max(px2).round() as i64).clamp(0, width);
        let y1 = (py1.min(py2).round() as i64).clamp(0, height);
        let y2 = (py1.max(py2).round() as i64).clamp(0, height);

        let out_width = (x2 - x1).max(0) as usize;
        let out_height = (y2 - y1).max(0) as usize;
        let grid = self.grid.crop(x1, y1, out_width, out_height);
        let grid_crs = GridCrs::new(
            self.grid_crs.crs,
            self.grid_crs.dimensions,
            [out_width as u64, out_height as u64, 0],
            [
                self.grid_crs.pixel_to_world_x(x1 as f64),
                self.grid_crs.pixel_to_world_y(y1 as f64),
                0.0,
            ],
            self.grid_crs.scale,
        )
        .expect("cropped grid retains the source's valid scale and a bounded size");

        Raster {
            grid,
            grid_crs,
            time: self.time,
            channel_index: self.channel_index,
            attributes_string: self.attributes_string.clone(),
            attributes_numeric: self.attributes_numeric.clone(),
        }
    }
}
