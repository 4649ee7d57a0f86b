//! Id assignment policies.
//!
//! The store normally lets the engine hand out the next id. [`ChaosSkip`]
//! occasionally asks the backend to jump ahead instead, leaving gaps in the
//! sequence; ids stay unique and increasing either way.

use std::sync::Mutex;

/// How the backend should pick the id of the next inserted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAssignment {
    /// The engine's next id.
    Next,
    /// Leave `n` unused ids before the new row.
    SkipAhead(u32),
    /// Use exactly this id. Only produced by `restore`.
    Exact(i64),
}

pub trait IdPolicy: Send + Sync {
    fn assign(&self) -> IdAssignment;
}

/// Consecutive ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

impl IdPolicy for Sequential {
    fn assign(&self) -> IdAssignment {
        IdAssignment::Next
    }
}

/// With probability `1/one_in`, skip ahead by a random `1..=max_skip`.
#[derive(Debug)]
pub struct ChaosSkip {
    one_in: u32,
    max_skip: u32,
    rng: Mutex<fastrand::Rng>,
}

impl ChaosSkip {
    pub fn new(one_in: u32, max_skip: u32) -> Self {
        Self::with_rng(one_in, max_skip, fastrand::Rng::new())
    }

    /// Deterministic variant for tests.
    pub fn seeded(one_in: u32, max_skip: u32, seed: u64) -> Self {
        Self::with_rng(one_in, max_skip, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(one_in: u32, max_skip: u32, rng: fastrand::Rng) -> Self {
        Self {
            one_in: one_in.max(1),
            max_skip: max_skip.max(1),
            rng: Mutex::new(rng),
        }
    }
}

impl IdPolicy for ChaosSkip {
    fn assign(&self) -> IdAssignment {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if rng.u32(0..self.one_in) == 0 {
            let skip = rng.u32(1..=self.max_skip);
            tracing::debug!(skip, "skipping ahead in id sequence");
            IdAssignment::SkipAhead(skip)
        } else {
            IdAssignment::Next
        }
    }
}
