//! Cross-worker reductions.
//!
//! Every coupling quantity that depends on worker-local data (interface
//! length, elevation samples, hydrologic volume and clock) is combined with
//! an associative, commutative reduction before it is used. All workers see
//! the identical result.

use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

/// Reduction operator over `f64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Sum of all contributions
    Sum,
    /// Largest contribution
    Max,
    /// Smallest contribution
    Min,
}

impl ReduceOp {
    /// Neutral element of the operator.
    pub fn identity(self) -> f64 {
        match self {
            ReduceOp::Sum => 0.0,
            ReduceOp::Max => f64::NEG_INFINITY,
            ReduceOp::Min => f64::INFINITY,
        }
    }

    /// Combine two values.
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }
}

/// Reduction primitives shared by all workers of a run.
///
/// The default implementation describes a single worker: every reduction
/// returns its input.
pub trait Reducer {
    /// This worker's rank. Rank 0 also runs the hydrologic solver.
    fn rank(&self) -> usize {
        0
    }

    /// Number of workers taking part in the run.
    fn n_workers(&self) -> usize {
        1
    }

    /// Combine `value` across all workers. Blocks until every worker has
    /// contributed.
    fn reduce(&self, value: f64, _op: ReduceOp) -> f64 {
        value
    }

    /// Sum across workers.
    fn reduce_sum(&self, value: f64) -> f64 {
        self.reduce(value, ReduceOp::Sum)
    }

    /// Maximum across workers.
    fn reduce_max(&self, value: f64) -> f64 {
        self.reduce(value, ReduceOp::Max)
    }

    /// Minimum across workers.
    fn reduce_min(&self, value: f64) -> f64 {
        self.reduce(value, ReduceOp::Min)
    }
}

/// A run with one worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleWorker;

impl Reducer for SingleWorker {}

/// In-process group of workers that rendezvous on every reduction.
///
/// Each worker owns one slot. A reduction writes the slot, waits for all
/// workers, folds the slots in rank order and waits again before any slot
/// may be reused, so every worker computes a bit-identical result.
#[derive(Debug)]
pub struct WorkerGroup {
    n_workers: usize,
    barrier: Barrier,
    slots: Mutex<Vec<f64>>,
}

impl WorkerGroup {
    /// Create a group for `n_workers` workers (at least one).
    pub fn new(n_workers: usize) -> Self {
        let n_workers = n_workers.max(1);
        Self {
            n_workers,
            barrier: Barrier::new(n_workers),
            slots: Mutex::new(vec![0.0; n_workers]),
        }
    }

    /// Number of workers in the group.
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Contribute `value` from `rank` and return the reduced value.
    pub fn reduce(&self, rank: usize, value: f64, op: ReduceOp) -> f64 {
        {
            let mut slots = self.slots.lock();
            slots[rank] = value;
        }
        self.barrier.wait();
        let result = {
            let slots = self.slots.lock();
            slots.iter().fold(op.identity(), |acc, &v| op.apply(acc, v))
        };
        self.barrier.wait();
        result
    }
}

/// One worker's view of a [`WorkerGroup`].
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    group: Arc<WorkerGroup>,
    rank: usize,
}

impl WorkerHandle {
    /// Handles for every rank of `group`.
    pub fn for_group(group: &Arc<WorkerGroup>) -> Vec<Self> {
        (0..group.n_workers())
            .map(|rank| Self {
                group: Arc::clone(group),
                rank,
            })
            .collect()
    }
}

impl Reducer for WorkerHandle {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_workers(&self) -> usize {
        self.group.n_workers()
    }

    fn reduce(&self, value: f64, op: ReduceOp) -> f64 {
        self.group.reduce(self.rank, value, op)
    }
}
