use num_traits::{AsPrimitive, NumCast};
use std::fmt::Debug;

/// Bound required of every concrete raster sample type. Mirrors the
/// teacher's `Pixel` trait (`geoengine_datatypes::raster::Pixel`): a
/// closed set of primitive numeric types usable as grid elements.
pub trait Pixel:
    Copy + Clone + Debug + PartialEq + PartialOrd + Send + Sync + NumCast + AsPrimitive<f64> + 'static
{
    const ELEMENT_TYPE: super::ElementType;

    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_pixel {
    ($t:ty, $variant:ident) => {
        impl Pixel for $t {
            const ELEMENT_TYPE: super::ElementType = super::ElementType::$variant;

            fn from_f64(v: f64) -> Self {
                num_traits::cast(v).unwrap_or_default()
            }
        }
    };
}

impl_pixel!(u8, U8);
impl_pixel!(u16, U16);
impl_pixel!(u32, U32);
impl_pixel!(i8, I8);
impl_pixel!(i16, I16);
impl_pixel!(i32, I32);
impl_pixel!(f32, F32);
impl_pixel!(f64, F64);
