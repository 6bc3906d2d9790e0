use crate::error::Error;
use async_trait::async_trait;
use mapping_datatypes::primitives::SpatialRect;
use mapping_datatypes::raster::{ElementType, GridCrs, TypedGrid};
use std::path::Path;

/// Opens an externally-stored image file and clips the window overlapping
/// `spatial` out of it (spec §4.5's "CRS-enabled image library"), filling
/// any margin that falls outside the file's own referenced extent with
/// `no_data`. Pluggable like `RasterBackend`: a real implementation wraps
/// a GDAL-equivalent decoder that reads the file's embedded geotransform.
#[async_trait]
pub trait ImageLibrary: Send + Sync {
    async fn read_clipped(
        &self,
        path: &Path,
        spatial: &SpatialRect,
        element_type: ElementType,
        no_data: Option<f64>,
    ) -> Result<(TypedGrid, GridCrs), Error>;
}

/// Stand-in decoder used where no real image library is wired up: treats
/// every file as covering exactly the requested rect at one pixel per
/// world unit and fills it entirely with `no_data` (or zero), since there
/// is no actual file format being decoded. Exercises the external-source
/// dispatch path end-to-end; swap in a real binding for production use.
#[derive(Default)]
pub struct NullImageLibrary;

#[async_trait]
impl ImageLibrary for NullImageLibrary {
    async fn read_clipped(
        &self,
        _path: &Path,
        spatial: &SpatialRect,
        element_type: ElementType,
        no_data: Option<f64>,
    ) -> Result<(TypedGrid, GridCrs), Error> {
        let width = spatial.width().round().max(1.0) as u64;
        let height = spatial.height().round().max(1.0) as u64;
        let grid_crs = GridCrs::new(
            spatial.crs,
            2,
            [width, height, 0],
            [spatial.x1, spatial.y1, 0.0],
            [1.0, 1.0, 0.0],
        )?;
        let mut grid = TypedGrid::new(element_type, width as usize, height as usize, no_data);
        grid.clear_f64(no_data.unwrap_or(0.0));
        Ok((grid, grid_crs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping_datatypes::primitives::CrsId;

    #[tokio::test]
    async fn null_image_library_fills_requested_rect_with_no_data() {
        let library = NullImageLibrary;
        let spatial = SpatialRect::new(0.0, 0.0, 4.0, 3.0, CrsId::new("EPSG", 4326)).unwrap();
        let (grid, grid_crs) = library
            .read_clipped(Path::new("/nonexistent.tif"), &spatial, ElementType::F32, Some(-9999.0))
            .await
            .unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid_crs.size, [4, 3, 0]);
    }
}
