//! Output compaction: staging selected boxes and flushing them to the
//! destination in the caller's layout.

use crate::geometry::ScoredBox;
use crate::kernel::Element;
use crate::plan::BOX_FIELDS;

/// Physical layout of the kept boxes in the destination buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputLayout {
    /// `score, x1, y1, x2, y2` repeated per kept box, in rank order.
    #[default]
    Interleaved,
    /// Five lanes `stride` elements apart (score, x1, y1, x2, y2); box `j`
    /// of lane `k` lands at `k * stride + j`.
    Planar {
        /// Distance in elements between output lanes.
        stride: usize,
    },
    /// Same shape as the score array: each kept score is written back at
    /// its candidate's original index, nothing else is touched.
    SparseOverwrite,
}

impl OutputLayout {
    /// Returns a lowercase name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLayout::Interleaved => "interleaved",
            OutputLayout::Planar { .. } => "planar",
            OutputLayout::SparseOverwrite => "sparse",
        }
    }

    /// Minimum destination length for `kept` boxes out of `count` candidates.
    pub fn required_len(&self, kept: usize, count: usize) -> usize {
        match *self {
            OutputLayout::Interleaved => kept * BOX_FIELDS,
            OutputLayout::Planar { stride } if kept > 0 => (BOX_FIELDS - 1) * stride + kept,
            OutputLayout::Planar { .. } => 0,
            OutputLayout::SparseOverwrite => count,
        }
    }
}

/// Accumulates kept boxes in a staging region and writes them to the
/// destination in batches.
///
/// With a staging capacity of zero every box is written straight to the
/// destination.
pub(crate) struct OutputCompactor<'a, T> {
    dest: &'a mut [T],
    layout: OutputLayout,
    capacity: usize,
    staged: usize,
    written: usize,
}

impl<'a, T: Element> OutputCompactor<'a, T> {
    pub(crate) fn new(dest: &'a mut [T], layout: OutputLayout, capacity: usize) -> Self {
        let capacity = match layout {
            OutputLayout::SparseOverwrite => 0,
            _ => capacity,
        };
        Self {
            dest,
            layout,
            capacity,
            staged: 0,
            written: 0,
        }
    }

    /// Boxes appended so far.
    pub(crate) fn count(&self) -> usize {
        self.written
    }

    /// Appends one box given as a `[score, x1, y1, x2, y2]` record.
    pub(crate) fn push(&mut self, staging: &mut [T], record: &[T], index: usize) {
        let record = &record[..BOX_FIELDS];
        if self.capacity == 0 {
            self.write_direct(record, index);
            self.written += 1;
            return;
        }

        match self.layout {
            OutputLayout::Planar { .. } => {
                for (lane, &value) in record.iter().enumerate() {
                    staging[lane * self.capacity + self.staged] = value;
                }
            }
            _ => {
                let at = self.staged * BOX_FIELDS;
                staging[at..at + BOX_FIELDS].copy_from_slice(record);
            }
        }
        self.staged += 1;
        self.written += 1;
        if self.staged == self.capacity {
            self.flush(staging);
        }
    }

    /// Copies all staged boxes to the destination and resets the staging
    /// region to its zero sentinel.
    pub(crate) fn flush(&mut self, staging: &mut [T]) {
        if self.staged == 0 {
            return;
        }
        let base = self.written - self.staged;
        match self.layout {
            OutputLayout::Planar { stride } => {
                for lane in 0..BOX_FIELDS {
                    let src = &staging[lane * self.capacity..lane * self.capacity + self.staged];
                    let at = lane * stride + base;
                    self.dest[at..at + self.staged].copy_from_slice(src);
                }
            }
            _ => {
                let len = self.staged * BOX_FIELDS;
                let at = base * BOX_FIELDS;
                self.dest[at..at + len].copy_from_slice(&staging[..len]);
            }
        }
        staging.iter_mut().for_each(|v| *v = T::zero());
        self.staged = 0;
    }

    fn write_direct(&mut self, record: &[T], index: usize) {
        let slot = self.written;
        match self.layout {
            OutputLayout::Interleaved => {
                let at = slot * BOX_FIELDS;
                self.dest[at..at + BOX_FIELDS].copy_from_slice(record);
            }
            OutputLayout::Planar { stride } => {
                for (lane, &value) in record.iter().enumerate() {
                    self.dest[lane * stride + slot] = value;
                }
            }
            OutputLayout::SparseOverwrite => self.dest[index] = record[0],
        }
    }
}

/// Reads `count` boxes back from an interleaved destination.
pub fn decode_interleaved<T: Element>(dest: &[T], count: usize) -> Vec<ScoredBox<T>> {
    dest.chunks_exact(BOX_FIELDS)
        .take(count)
        .map(|c| ScoredBox::new(c[0], c[1], c[2], c[3], c[4]))
        .collect()
}

/// Reads `count` boxes back from a planar destination.
pub fn decode_planar<T: Element>(dest: &[T], stride: usize, count: usize) -> Vec<ScoredBox<T>> {
    (0..count)
        .map(|j| {
            ScoredBox::new(
                dest[j],
                dest[stride + j],
                dest[2 * stride + j],
                dest[3 * stride + j],
                dest[4 * stride + j],
            )
        })
        .collect()
}

/// Returns `(index, score)` for every non-zero entry of a sparse destination.
pub fn decode_sparse<T: Element>(dest: &[T]) -> Vec<(usize, T)> {
    dest.iter()
        .enumerate()
        .filter(|(_, s)| **s != T::zero())
        .map(|(idx, &s)| (idx, s))
        .collect()
}
