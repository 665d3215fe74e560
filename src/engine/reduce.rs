//! Cross-worker reduction of per-worker round maxima.
//!
//! Every worker publishes its local best into its own slot of a shared
//! staging area, waits on the round barrier, then reads all slots and reduces
//! them to the same global winner. The reduction is deterministic: the
//! highest score wins and ties go to the lowest worker id, whose slice holds
//! the lowest global indices.
//!
//! The round barrier can be aborted: a worker that panics releases the rest
//! of the group, whose next rendezvous then reports [`GroupAborted`].

use std::sync::{Condvar, Mutex, PoisonError};

use crate::kernel::{Element, RoundWinner};

/// One published slot per worker.
pub(crate) struct SharedStaging<T> {
    slots: Vec<Mutex<Option<RoundWinner<T>>>>,
}

impl<T: Element> SharedStaging<T> {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Stores `candidate` as worker `worker`'s local best for this round.
    pub(crate) fn publish(&self, worker: usize, candidate: Option<RoundWinner<T>>) {
        let mut slot = self.slots[worker]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = candidate;
    }

    /// Reduces all slots to `(owner, winner)`.
    pub(crate) fn reduce(&self) -> Option<(usize, RoundWinner<T>)> {
        let published = self.slots.iter().map(|slot| {
            *slot.lock().unwrap_or_else(PoisonError::into_inner)
        });
        reduce_winners(published)
    }
}

/// Picks the highest score; on ties the earliest entry is kept.
pub(crate) fn reduce_winners<T: Element>(
    published: impl IntoIterator<Item = Option<RoundWinner<T>>>,
) -> Option<(usize, RoundWinner<T>)> {
    let mut best: Option<(usize, RoundWinner<T>)> = None;
    for (worker, candidate) in published.into_iter().enumerate() {
        let Some(candidate) = candidate else {
            continue;
        };
        match best {
            Some((_, current)) if !(candidate.score > current.score) => {}
            _ => best = Some((worker, candidate)),
        }
    }
    best
}

/// Returned by a rendezvous once another worker has abandoned the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GroupAborted;

struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// Reusable barrier that every waiter leaves early once it is aborted.
pub(crate) struct RoundBarrier {
    workers: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl RoundBarrier {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            workers,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            released: Condvar::new(),
        }
    }

    /// Blocks until all workers arrive or the barrier is aborted.
    pub(crate) fn wait(&self) -> Result<(), GroupAborted> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.aborted {
            return Err(GroupAborted);
        }
        state.arrived += 1;
        if state.arrived == self.workers {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(());
        }
        let generation = state.generation;
        while state.generation == generation && !state.aborted {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.generation == generation {
            Err(GroupAborted)
        } else {
            Ok(())
        }
    }

    /// Releases every current and future waiter with [`GroupAborted`].
    pub(crate) fn abort(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.aborted = true;
        self.released.notify_all();
    }
}

/// Synchronisation shared by a worker group for the whole invocation.
pub(crate) struct RoundExchange<T> {
    barrier: RoundBarrier,
    staging: SharedStaging<T>,
}

impl<T: Element> RoundExchange<T> {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            barrier: RoundBarrier::new(workers),
            staging: SharedStaging::new(workers),
        }
    }

    /// Blocks until every worker of the group reaches the same point.
    pub(crate) fn rendezvous(&self) -> Result<(), GroupAborted> {
        self.barrier.wait()
    }

    /// Tells the rest of the group that this worker will not arrive again.
    pub(crate) fn abort(&self) {
        self.barrier.abort();
    }

    pub(crate) fn publish(&self, worker: usize, candidate: Option<RoundWinner<T>>) {
        self.staging.publish(worker, candidate);
    }

    pub(crate) fn reduce(&self) -> Option<(usize, RoundWinner<T>)> {
        self.staging.reduce()
    }
}
