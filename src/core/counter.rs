use num_traits as num;
use std::fmt;

/// This trait represents the operations a dense counter store must be able to perform on its
/// element type. The `ToPrimitive` trait is needed to widen counts for aggregation (usually in
/// the context of percentiles). The `FromPrimitive` to convert back into an integer count.
/// Partial ordering is used for threshholding, also usually in the context of percentiles.
pub trait Counter:
    num::Num
    + num::ToPrimitive
    + num::FromPrimitive
    + num::Saturating
    + num::CheckedSub
    + num::CheckedAdd
    + Copy
    + PartialOrd<Self>
    + fmt::Debug
{
    /// Counter as a u64.
    fn as_u64(&self) -> u64;
    /// Convert a u64 into a counter, or `None` when it exceeds the counter's width.
    fn from_u64_exact(count: u64) -> Option<Self>;
}

macro_rules! impl_counter {
    ($t:ty) => {
        impl Counter for $t {
            #[inline]
            fn as_u64(&self) -> u64 {
                u64::from(*self)
            }
            #[inline]
            fn from_u64_exact(count: u64) -> Option<Self> {
                Self::try_from(count).ok()
            }
        }
    };
}

impl_counter!(u8);
impl_counter!(u16);
impl_counter!(u32);
impl_counter!(u64);
