use super::pixel::Pixel;
use super::ElementType;
use serde::{Deserialize, Serialize};

/// A dense 2-D pixel buffer, row-major, with an optional no-data sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2D<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
    pub no_data: Option<T>,
}

impl<T: Pixel> Grid2D<T> {
    pub fn new(width: usize, height: usize, no_data: Option<T>) -> Self
    where
        T: Default,
    {
        Self {
            width,
            height,
            data: vec![no_data.unwrap_or_default(); width * height],
            no_data,
        }
    }

    pub fn from_data(width: usize, height: usize, data: Vec<T>, no_data: Option<T>) -> Self {
        assert_eq!(data.len(), width * height, "grid data does not match dimensions");
        Self {
            width,
            height,
            data,
            no_data,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.width + x] = value;
    }

    pub fn is_no_data(&self, value: T) -> bool {
        self.no_data == Some(value)
    }

    pub fn clear(&mut self, value: T) {
        self.data.iter_mut().for_each(|p| *p = value);
    }

    pub fn clear_f64(&mut self, value: f64) {
        self.clear(T::from_f64(value));
    }

    /// Extracts the `width x height` window starting at `(x_off, y_off)`
    /// as a fresh grid, padding with `no_data` outside `self`'s bounds.
    pub fn crop(&self, x_off: i64, y_off: i64, width: usize, height: usize) -> Self
    where
        T: Default,
    {
        let mut out = Grid2D::new(width, height, self.no_data);
        out.blit(self, -x_off, -y_off);
        out
    }

    /// Sets `no_data` to `value` if this grid does not already declare one
    /// (spec §4.3 step 3: the channel's no-data wins when the source has
    /// none of its own).
    pub fn adopt_no_data_if_absent(&mut self, value: f64) {
        if self.no_data.is_none() {
            self.no_data = Some(T::from_f64(value));
        }
    }

    /// Copies `src` into `self` at integer offset `(dest_x, dest_y)`,
    /// clamped to the overlap of both grids. Disjoint input is a no-op
    /// (the raster query path never hands a fully disjoint tile here — see
    /// `spec.md` §4.4 step 7, which treats that as a backend bug).
    pub fn blit(&mut self, src: &Grid2D<T>, dest_x: i64, dest_y: i64) {
        let x1 = dest_x.max(0);
        let y1 = dest_y.max(0);
        let x2 = (dest_x + src.width as i64).min(self.width as i64);
        let y2 = (dest_y + src.height as i64).min(self.height as i64);
        if x1 >= x2 || y1 >= y2 {
            return;
        }
        for y in y1..y2 {
            let src_y = (y - dest_y) as usize;
            for x in x1..x2 {
                let src_x = (x - dest_x) as usize;
                self.set(x as usize, y as usize, src.get(src_x, src_y));
            }
        }
    }

    /// Reverses rows and/or columns in place (spec §4.3 step 2, flip
    /// reconciliation).
    pub fn flip(&mut self, flip_x: bool, flip_y: bool) {
        if flip_y {
            for y in 0..self.height / 2 {
                let other = self.height - 1 - y;
                for x in 0..self.width {
                    let a = self.get(x, y);
                    let b = self.get(x, other);
                    self.set(x, y, b);
                    self.set(x, other, a);
                }
            }
        }
        if flip_x {
            for y in 0..self.height {
                for x in 0..self.width / 2 {
                    let other = self.width - 1 - x;
                    let a = self.get(x, y);
                    let b = self.get(other, y);
                    self.set(x, y, b);
                    self.set(other, y, a);
                }
            }
        }
    }

    /// Area-average downsample by exactly 2x in each dimension (last
    /// row/column of an odd-sized source is folded into the preceding
    /// cell), used by the pyramid build (spec §4.3 step 5). Samples equal
    /// to `no_data` are excluded from the average; a cell whose inputs are
    /// all no-data stays no-data.
    pub fn downscale_2x(&self) -> Self
    where
        T: Default,
    {
        let out_w = (self.width + 1) / 2;
        let out_h = (self.height + 1) / 2;
        let mut out = Grid2D::new(out_w, out_h, self.no_data);
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut sum = 0.0f64;
                let mut count = 0u32;
                for dy in 0..2 {
                    let sy = oy * 2 + dy;
                    if sy >= self.height {
                        continue;
                    }
                    for dx in 0..2 {
                        let sx = ox * 2 + dx;
                        if sx >= self.width {
                            continue;
                        }
                        let v = self.get(sx, sy);
                        if !self.is_no_data(v) {
                            use num_traits::AsPrimitive;
                            sum += AsPrimitive::<f64>::as_(v);
                            count += 1;
                        }
                    }
                }
                if count > 0 {
                    out.set(ox, oy, T::from_f64(sum / count as f64));
                } else if let Some(nd) = self.no_data {
                    out.set(ox, oy, nd);
                }
            }
        }
        out
    }

    /// Like `blit`, but maps `out = in * scale + offset` sample-wise and
    /// routes no-data through to the destination's no-data value
    /// (spec §4.4 step 7).
    pub fn blit_transformed<S: Pixel>(
        &mut self,
        src: &Grid2D<S>,
        dest_x: i64,
        dest_y: i64,
        offset: f64,
        scale: f64,
    ) where
        T: Default,
    {
        let x1 = dest_x.max(0);
        let y1 = dest_y.max(0);
        let x2 = (dest_x + src.width as i64).min(self.width as i64);
        let y2 = (dest_y + src.height as i64).min(self.height as i64);
        if x1 >= x2 || y1 >= y2 {
            return;
        }
        for y in y1..y2 {
            let src_y = (y - dest_y) as usize;
            for x in x1..x2 {
                let src_x = (x - dest_x) as usize;
                let raw = src.get(src_x, src_y);
                if src.is_no_data(raw) {
                    if let Some(nd) = self.no_data {
                        self.set(x as usize, y as usize, nd);
                    }
                } else {
                    use num_traits::AsPrimitive;
                    let transformed = AsPrimitive::<f64>::as_(raw) * scale + offset;
                    self.set(x as usize, y as usize, T::from_f64(transformed));
                }
            }
        }
    }
}

/// Runtime-dispatched 2-D grid, one variant per `ElementType`. Callers
/// `match` once to reach a monomorphized routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedGrid {
    U8(Grid2D<u8>),
    U16(Grid2D<u16>),
    U32(Grid2D<u32>),
    I8(Grid2D<i8>),
    I16(Grid2D<i16>),
    I32(Grid2D<i32>),
    F32(Grid2D<f32>),
    F64(Grid2D<f64>),
}

macro_rules! typed_grid_dispatch {
    ($self:expr, $grid:ident => $body:expr) => {
        match $self {
            TypedGrid::U8($grid) => $body,
            TypedGrid::U16($grid) => $body,
            TypedGrid::U32($grid) => $body,
            TypedGrid::I8($grid) => $body,
            TypedGrid::I16($grid) => $body,
            TypedGrid::I32($grid) => $body,
            TypedGrid::F32($grid) => $body,
            TypedGrid::F64($grid) => $body,
        }
    };
}

impl TypedGrid {
    /// Builds an empty grid of the given runtime element type, filled with
    /// `no_data` (or each type's default if absent).
    pub fn new(element_type: ElementType, width: usize, height: usize, no_data: Option<f64>) -> Self {
        macro_rules! grid_of {
            ($t:ty) => {
                Grid2D::<$t>::new(width, height, no_data.map(<$t>::from_f64))
            };
        }
        match element_type {
            ElementType::U8 => TypedGrid::U8(grid_of!(u8)),
            ElementType::I8 => TypedGrid::I8(grid_of!(i8)),
            ElementType::U16 => TypedGrid::U16(grid_of!(u16)),
            ElementType::I16 => TypedGrid::I16(grid_of!(i16)),
            ElementType::U32 => TypedGrid::U32(grid_of!(u32)),
            ElementType::I32 => TypedGrid::I32(grid_of!(i32)),
            ElementType::F32 => TypedGrid::F32(grid_of!(f32)),
            ElementType::F64 => TypedGrid::F64(grid_of!(f64)),
        }
    }

    pub fn clear_f64(&mut self, value: f64) {
        typed_grid_dispatch!(self, g => g.clear_f64(value))
    }

    pub fn adopt_no_data_if_absent(&mut self, value: f64) {
        typed_grid_dispatch!(self, g => g.adopt_no_data_if_absent(value))
    }

    pub fn crop(&self, x_off: i64, y_off: i64, width: usize, height: usize) -> TypedGrid {
        match self {
            TypedGrid::U8(g) => TypedGrid::U8(g.crop(x_off, y_off, width, height)),
            TypedGrid::I8(g) => TypedGrid::I8(g.crop(x_off, y_off, width, height)),
            TypedGrid::U16(g) => TypedGrid::U16(g.crop(x_off, y_off, width, height)),
            TypedGrid::I16(g) => TypedGrid::I16(g.crop(x_off, y_off, width, height)),
            TypedGrid::U32(g) => TypedGrid::U32(g.crop(x_off, y_off, width, height)),
            TypedGrid::I32(g) => TypedGrid::I32(g.crop(x_off, y_off, width, height)),
            TypedGrid::F32(g) => TypedGrid::F32(g.crop(x_off, y_off, width, height)),
            TypedGrid::F64(g) => TypedGrid::F64(g.crop(x_off, y_off, width, height)),
        }
    }

    /// Blits `src` into `self`, requiring identical element types (used
    /// when no read-time transform applies). Returns `false` on a type
    /// mismatch, which the caller should treat as an internal invariant
    /// violation (`MustNotHappen`) since the channel's stored type never
    /// changes between writes.
    pub fn blit_same_type(&mut self, src: &TypedGrid, dest_x: i64, dest_y: i64) -> bool {
        match (self, src) {
            (TypedGrid::U8(d), TypedGrid::U8(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::I8(d), TypedGrid::I8(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::U16(d), TypedGrid::U16(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::I16(d), TypedGrid::I16(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::U32(d), TypedGrid::U32(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::I32(d), TypedGrid::I32(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::F32(d), TypedGrid::F32(s)) => d.blit(s, dest_x, dest_y),
            (TypedGrid::F64(d), TypedGrid::F64(s)) => d.blit(s, dest_x, dest_y),
            _ => return false,
        }
        true
    }

    /// Blits `src` into `self` applying `out = in * scale + offset`,
    /// regardless of whether the two grids share an element type (spec
    /// §4.4 step 7).
    pub fn blit_transformed(&mut self, src: &TypedGrid, dest_x: i64, dest_y: i64, offset: f64, scale: f64) {
        macro_rules! against_src {
            ($d:expr) => {
                match src {
                    TypedGrid::U8(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::I8(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::U16(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::I16(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::U32(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::I32(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::F32(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                    TypedGrid::F64(s) => $d.blit_transformed(s, dest_x, dest_y, offset, scale),
                }
            };
        }
        match self {
            TypedGrid::U8(d) => against_src!(d),
            TypedGrid::I8(d) => against_src!(d),
            TypedGrid::U16(d) => against_src!(d),
            TypedGrid::I16(d) => against_src!(d),
            TypedGrid::U32(d) => against_src!(d),
            TypedGrid::I32(d) => against_src!(d),
            TypedGrid::F32(d) => against_src!(d),
            TypedGrid::F64(d) => against_src!(d),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TypedGrid::U8(_) => ElementType::U8,
            TypedGrid::U16(_) => ElementType::U16,
            TypedGrid::U32(_) => ElementType::U32,
            TypedGrid::I8(_) => ElementType::I8,
            TypedGrid::I16(_) => ElementType::I16,
            TypedGrid::I32(_) => ElementType::I32,
            TypedGrid::F32(_) => ElementType::F32,
            TypedGrid::F64(_) => ElementType::F64,
        }
    }

    pub fn width(&self) -> usize {
        typed_grid_dispatch!(self, g => g.width)
    }

    pub fn height(&self) -> usize {
        typed_grid_dispatch!(self, g => g.height)
    }

    pub fn flip(&mut self, flip_x: bool, flip_y: bool) {
        typed_grid_dispatch!(self, g => g.flip(flip_x, flip_y))
    }

    pub fn downscale_2x(&self) -> TypedGrid {
        match self {
            TypedGrid::U8(g) => TypedGrid::U8(g.downscale_2x()),
            TypedGrid::U16(g) => TypedGrid::U16(g.downscale_2x()),
            TypedGrid::U32(g) => TypedGrid::U32(g.downscale_2x()),
            TypedGrid::I8(g) => TypedGrid::I8(g.downscale_2x()),
            TypedGrid::I16(g) => TypedGrid::I16(g.downscale_2x()),
            TypedGrid::I32(g) => TypedGrid::I32(g.downscale_2x()),
            TypedGrid::F32(g) => TypedGrid::F32(g.downscale_2x()),
            TypedGrid::F64(g) => TypedGrid::F64(g.downscale_2x()),
        }
    }

    /// Reconstructs a typed grid from a decoded tile payload, given the
    /// channel's declared `ElementType` and the stored `no_data` value
    /// (spec §4.2: the decoder consults nothing but these caller-supplied
    /// facts).
    pub fn from_bytes(element_type: ElementType, width: usize, height: usize, bytes: &[u8], no_data: Option<f64>) -> Self {
        macro_rules! grid_of {
            ($t:ty, $sz:expr) => {{
                let data: Vec<$t> = bytes
                    .chunks_exact($sz)
                    .map(|c| <$t>::from_le_bytes(c.try_into().expect("chunk size matches")))
                    .collect();
                Grid2D::from_data(width, height, data, no_data.map(|v| <$t as num_traits::NumCast>::from(v).unwrap_or_default()))
            }};
        }
        match element_type {
            ElementType::U8 => TypedGrid::U8(Grid2D::from_data(
                width,
                height,
                bytes.to_vec(),
                no_data.map(|v| v as u8),
            )),
            ElementType::I8 => TypedGrid::I8(Grid2D::from_data(
                width,
                height,
                bytes.iter().map(|b| *b as i8).collect(),
                no_data.map(|v| v as i8),
            )),
            ElementType::U16 => TypedGrid::U16(grid_of!(u16, 2)),
            ElementType::I16 => TypedGrid::I16(grid_of!(i16, 2)),
            ElementType::U32 => TypedGrid::U32(grid_of!(u32, 4)),
            ElementType::I32 => TypedGrid::I32(grid_of!(i32, 4)),
            ElementType::F32 => TypedGrid::F32(grid_of!(f32, 4)),
            ElementType::F64 => TypedGrid::F64(grid_of!(f64, 8)),
        }
    }

    /// The raw little-endian bytes of the pixel buffer, for handing to a
    /// `TileCodec` (spec §4.2). No-data is not encoded separately; the
    /// channel's `DataDescription` supplies it on decode.
    pub fn to_bytes(&self) -> Vec<u8> {
        macro_rules! bytes_of {
            ($g:expr) => {
                $g.data.iter().flat_map(|v| v.to_le_bytes()).collect()
            };
        }
        match self {
            TypedGrid::U8(g) => g.data.clone(),
            TypedGrid::I8(g) => g.data.iter().map(|v| *v as u8).collect(),
            TypedGrid::U16(g) => bytes_of!(g),
            TypedGrid::I16(g) => bytes_of!(g),
            TypedGrid::U32(g) => bytes_of!(g),
            TypedGrid::I32(g) => bytes_of!(g),
            TypedGrid::F32(g) => bytes_of!(g),
            TypedGrid::F64(g) => bytes_of!(g),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_clamps_to_overlap() {
        let mut dest = Grid2D::<u8>::new(4, 4, Some(0));
        let src = Grid2D::from_data(3, 3, vec![9; 9], None);
        dest.blit(&src, 2, 2);
        assert_eq!(dest.get(2, 2), 9);
        assert_eq!(dest.get(3, 3), 9);
        assert_eq!(dest.get(0, 0), 0);
    }

    #[test]
    fn blit_transformed_maps_no_data() {
        let mut dest = Grid2D::<f32>::new(2, 2, Some(-1.0));
        let src = Grid2D::from_data(2, 2, vec![10u16, 0, 20, 0], Some(0));
        dest.blit_transformed(&src, 0, 0, 0.0, 0.1);
        assert_eq!(dest.get(0, 0), 1.0);
        assert_eq!(dest.get(1, 0), -1.0);
        assert_eq!(dest.get(0, 1), 2.0);
    }
}
