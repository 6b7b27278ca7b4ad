//! Choice of the first neighbor a node explores on startup.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::NodeId;

/// Picks which neighbor receives a node's initial EXPLORE.
pub trait NeighborSelector: Send {
    /// Return an index into `candidates`, or `None` when it is empty.
    fn select(&mut self, candidates: &[NodeId]) -> Option<usize>;
}

/// Always the first neighbor in topology order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstNeighbor;

impl NeighborSelector for FirstNeighbor {
    fn select(&mut self, candidates: &[NodeId]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Uniformly random pick, reproducible from a seed.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from the OS, for production runs.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl NeighborSelector for SeededRandom {
    fn select(&mut self, candidates: &[NodeId]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(self.rng.random_range(0..candidates.len()))
    }
}

impl<S: NeighborSelector + ?Sized> NeighborSelector for Box<S> {
    fn select(&mut self, candidates: &[NodeId]) -> Option<usize> {
        (**self).select(candidates)
    }
}
