//! Scalar reference kernel built from lane-wide batch operations.

use crate::kernel::batch::{
    add_assign, fill, first_max, max_relu, min_relu, mul, mul_assign, mul_scalar, relu_assign,
    rsub_assign, sub, sub_assign, zero_where_greater,
};
use crate::kernel::{Element, IouScratch, Kernel, RoundWinner, TileMut};

/// Portable kernel for every [`Element`] type.
///
/// The IoU sweep runs as a sequence of whole-lane passes through the four
/// scratch lanes, the way a vector unit would issue it.
pub struct ScalarKernel;

impl<T: Element> Kernel<T> for ScalarKernel {
    fn max_with_index(scores: &[T]) -> Option<(T, usize)> {
        first_max(scores)
    }

    fn suppress(
        tile: TileMut<'_, T>,
        scratch: IouScratch<'_, T>,
        winner: &RoundWinner<T>,
        thresh_iou: T,
    ) {
        let len = tile.len();
        if len == 0 {
            return;
        }
        let TileMut { scores, coords } = tile;
        let [s0, s1, s2, s3] = scratch.lanes;
        let (s0, s1, s2, s3) = (&mut s0[..len], &mut s1[..len], &mut s2[..len], &mut s3[..len]);

        // intersection width
        fill(s1, winner.x1);
        max_relu(s0, coords.x1, s1);
        fill(s3, winner.x2);
        min_relu(s2, coords.x2, s3);
        rsub_assign(s0, s2);
        relu_assign(s0);

        // intersection height
        fill(s2, winner.y1);
        max_relu(s1, coords.y1, s2);
        fill(s2, winner.y2);
        min_relu(s3, coords.y2, s2);
        rsub_assign(s1, s3);
        relu_assign(s1);

        mul_assign(s0, s1);

        // union = area + winner area - intersection
        sub(s1, coords.x2, coords.x1);
        sub(s3, coords.y2, coords.y1);
        mul(s2, s1, s3);
        fill(s1, winner.area);
        add_assign(s2, s1);
        sub_assign(s2, s0);

        mul_scalar(s2, thresh_iou);
        zero_where_greater(scores, s0, s2);
    }
}
