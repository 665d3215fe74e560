//! Element-wise batch operations over typed lanes.
//!
//! These are the slice-level primitives the scalar kernel composes into the
//! IoU sweep. Every binary operation requires operands of equal length; the
//! in-place variants read their left operand from `dst`.

use crate::kernel::Element;
use crate::util::math::relu;

/// `dst[i] = value`
pub fn fill<T: Element>(dst: &mut [T], value: T) {
    dst.iter_mut().for_each(|d| *d = value);
}

/// `dst[i] = a[i] - b[i]`
pub fn sub<T: Element>(dst: &mut [T], a: &[T], b: &[T]) {
    debug_assert!(a.len() >= dst.len() && b.len() >= dst.len());
    for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
        *d = x - y;
    }
}

/// `dst[i] = a[i] * b[i]`
pub fn mul<T: Element>(dst: &mut [T], a: &[T], b: &[T]) {
    debug_assert!(a.len() >= dst.len() && b.len() >= dst.len());
    for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
        *d = x * y;
    }
}

/// `dst[i] = dst[i] + a[i]`
pub fn add_assign<T: Element>(dst: &mut [T], a: &[T]) {
    for (d, &x) in dst.iter_mut().zip(a) {
        *d = *d + x;
    }
}

/// `dst[i] = dst[i] - a[i]`
pub fn sub_assign<T: Element>(dst: &mut [T], a: &[T]) {
    for (d, &x) in dst.iter_mut().zip(a) {
        *d = *d - x;
    }
}

/// `dst[i] = a[i] - dst[i]`
pub fn rsub_assign<T: Element>(dst: &mut [T], a: &[T]) {
    for (d, &x) in dst.iter_mut().zip(a) {
        *d = x - *d;
    }
}

/// `dst[i] = dst[i] * a[i]`
pub fn mul_assign<T: Element>(dst: &mut [T], a: &[T]) {
    for (d, &x) in dst.iter_mut().zip(a) {
        *d = *d * x;
    }
}

/// `dst[i] = dst[i] * value`
pub fn mul_scalar<T: Element>(dst: &mut [T], value: T) {
    dst.iter_mut().for_each(|d| *d = *d * value);
}

/// `dst[i] = max(dst[i], 0)`
pub fn relu_assign<T: Element>(dst: &mut [T]) {
    dst.iter_mut().for_each(|d| *d = relu(*d));
}

/// `dst[i] = max(src[i], bound[i])` via `relu(src - bound) + bound`.
pub fn max_relu<T: Element>(dst: &mut [T], src: &[T], bound: &[T]) {
    sub(dst, src, bound);
    relu_assign(dst);
    add_assign(dst, bound);
}

/// `dst[i] = min(src[i], bound[i])` via `bound - relu(bound - src)`.
pub fn min_relu<T: Element>(dst: &mut [T], src: &[T], bound: &[T]) {
    sub(dst, bound, src);
    relu_assign(dst);
    rsub_assign(dst, bound);
}

/// Zeroes `scores[i]` wherever `value[i] > limit[i]`.
pub fn zero_where_greater<T: Element>(scores: &mut [T], value: &[T], limit: &[T]) {
    for ((s, &v), &l) in scores.iter_mut().zip(value).zip(limit) {
        if !(v <= l) {
            *s = T::zero();
        }
    }
}

/// First index of the maximum; NaN entries never win.
pub fn first_max<T: Element>(src: &[T]) -> Option<(T, usize)> {
    let mut best: Option<(T, usize)> = None;
    for (idx, &value) in src.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((current, _)) if !(value > current) => {}
            _ => best = Some((value, idx)),
        }
    }
    best
}
