use std::sync::atomic::{AtomicU64, Ordering};

use super::IdGenerator;
use crate::error::IdError;

/// Monotonic counter producing `start, start + step, start + 2*step, ...`.
///
/// ## Example
/// ```rust
/// use eventvisor::ids::{CounterIds, IdGenerator};
///
/// let ids = CounterIds::new(10, 10);
/// assert_eq!(ids.next_id().unwrap(), 10);
/// assert_eq!(ids.next_id().unwrap(), 20);
/// ```
#[derive(Debug)]
pub struct CounterIds {
    next: AtomicU64,
    step: u64,
}

impl CounterIds {
    /// Creates a counter. A zero `step` is treated as 1.
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            step: step.max(1),
        }
    }
}

impl Default for CounterIds {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl IdGenerator for CounterIds {
    fn next_id(&self) -> Result<u64, IdError> {
        match self.next.fetch_add(self.step, Ordering::Relaxed) {
            0 => Err(IdError::Zero),
            id => Ok(id),
        }
    }
}
