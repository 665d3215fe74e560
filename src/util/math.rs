//! Alignment and activation helpers shared by the planner and kernels.

use num_traits::Float;

/// Rounds `value` up to the next multiple of `align`.
#[inline]
pub(crate) fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Rounds `value` down to a multiple of `align`.
#[inline]
pub(crate) fn align_down(value: usize, align: usize) -> usize {
    value / align * align
}

/// Rectified linear unit: `max(v, 0)`.
#[inline]
pub(crate) fn relu<T: Float>(v: T) -> T {
    if v > T::zero() {
        v
    } else {
        T::zero()
    }
}
