use crate::error::{self, Result};
use crate::primitives::CrsId;
use serde::{Deserialize, Serialize};
use snafu::ensure;

const MAX_SIZE: u64 = 1 << 24;

/// The grid this dataset is defined over: an `n`-dimensional (1-3) array of
/// `size[d]` cells, `scale[d]` units wide, anchored at `origin[d]`.
///
/// Equality is tolerant (spec §3.2): origins within 0.5 units, scales
/// within 0.1%. Use `==` for that tolerant comparison; use
/// `GridCrs::verify` to check the hard invariants on construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridCrs {
    pub crs: CrsId,
    pub dimensions: u8,
    pub size: [u64; 3],
    pub origin: [f64; 3],
    pub scale: [f64; 3],
}

impl GridCrs {
    pub fn new(
        crs: CrsId,
        dimensions: u8,
        size: [u64; 3],
        origin: [f64; 3],
        scale: [f64; 3],
    ) -> Result<Self> {
        let grid = Self {
            crs,
            dimensions,
            size,
            origin,
            scale,
        };
        grid.verify()?;
        Ok(grid)
    }

    pub fn verify(&self) -> Result<()> {
        ensure!(
            (1..=3).contains(&self.dimensions),
            error::InvalidDimensions {
                dimensions: self.dimensions as usize
            }
        );
        for axis in 0..self.dimensions as usize {
            ensure!(
                self.size[axis] <= MAX_SIZE,
                error::SizeOutOfLimits {
                    axis,
                    size: self.size[axis]
                }
            );
            ensure!(self.scale[axis] != 0.0, error::ZeroScale { axis });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> u64 {
        self.size[..self.dimensions as usize].iter().product()
    }

    pub fn world_to_pixel_x(&self, x: f64) -> f64 {
        (x - self.origin[0]) / self.scale[0]
    }

    pub fn world_to_pixel_y(&self, y: f64) -> f64 {
        (y - self.origin[1]) / self.scale[1]
    }

    pub fn pixel_to_world_x(&self, px: f64) -> f64 {
        self.origin[0] + px * self.scale[0]
    }

    pub fn pixel_to_world_y(&self, py: f64) -> f64 {
        self.origin[1] + py * self.scale[1]
    }
}

impl PartialEq for GridCrs {
    fn eq(&self, other: &Self) -> bool {
        if self.dimensions != other.dimensions || self.crs != other.crs {
            return false;
        }
        for i in 0..self.dimensions as usize {
            if self.size[i] != other.size[i] {
                return false;
            }
            if (self.origin[i] - other.origin[i]).abs() > 0.5 {
                return false;
            }
            if (self.scale[i] / other.scale[i] - 1.0).abs() > 0.001 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crs2d(size: [u64; 3], origin: [f64; 3], scale: [f64; 3]) -> GridCrs {
        GridCrs::new(CrsId::WGS84, 2, size, origin, scale).unwrap()
    }

    #[test]
    fn rejects_zero_scale() {
        assert!(GridCrs::new(CrsId::WGS84, 2, [10, 10, 0], [0.0; 3], [1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn rejects_oversized_dimension() {
        assert!(GridCrs::new(CrsId::WGS84, 2, [1 << 25, 1, 0], [0.0; 3], [1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn equality_is_tolerant() {
        let a = crs2d([100, 100, 0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = crs2d([100, 100, 0], [0.3, -0.2, 0.0], [1.0005, 0.9995, 1.0]);
        let c = crs2d([100, 100, 0], [2.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
