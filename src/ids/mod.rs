//! # Distributed identifiers.
//!
//! - [`IdGenerator`] - seam for anything producing unique `u64` ids
//! - [`Sonyflake`] - time-ordered generator (39 bit time, 8 bit sequence, 16 bit machine)
//! - [`CounterIds`] - deterministic counter, for tests and single-process setups
//!
//! The value `0` is reserved by the broker as the broadcast wildcard, so no
//! generator in this module ever returns it.

mod counter;
mod sonyflake;

use std::sync::Arc;

use crate::error::IdError;

pub use counter::CounterIds;
pub use sonyflake::{Parts, Sonyflake};

/// Source of process-unique, non-zero 64-bit identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    /// Returns the next identifier.
    fn next_id(&self) -> Result<u64, IdError>;
}

impl<T: IdGenerator + ?Sized> IdGenerator for Arc<T> {
    fn next_id(&self) -> Result<u64, IdError> {
        (**self).next_id()
    }
}

/// Shared handle to an id generator.
pub type IdRef = Arc<dyn IdGenerator>;
