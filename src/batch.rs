//! Independent invocations over a batch of candidate sets.
//!
//! Each set (one image of a detection batch, say) is processed on its own
//! with the same configuration. With the `rayon` feature and
//! `config.parallel` set, sets are distributed over the rayon pool.

use crate::engine::{Nms, NmsConfig};
use crate::geometry::{CandidateSet, ScoredBox};
use crate::kernel::Element;
use crate::util::NmsResult;

/// Runs NMS on every set and returns the kept boxes per set, in input order.
///
/// Fails with the first error encountered; sets processed before the failure
/// have already been consumed.
pub fn nms_batch<T: Element>(
    sets: &mut [CandidateSet<T>],
    config: &NmsConfig,
) -> NmsResult<Vec<Vec<ScoredBox<T>>>> {
    config.validate()?;
    let nms = Nms::new(config.clone());

    #[cfg(feature = "rayon")]
    if config.parallel {
        use rayon::prelude::*;
        return sets.par_iter_mut().map(|set| nms.select(set)).collect();
    }

    sets.iter_mut().map(|set| nms.select(set)).collect()
}
