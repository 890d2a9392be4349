//! # Sonyflake-style distributed id generator.
//!
//! Layout of a generated id (most significant bit first):
//! ```text
//! ┌───────────────────────────┬──────────┬────────────────┐
//! │ 39 bits elapsed time      │ 8 bits   │ 16 bits        │
//! │ (10ms units since start)  │ sequence │ machine id     │
//! └───────────────────────────┴──────────┴────────────────┘
//! ```
//!
//! ## Rules
//! - Ids from one generator are strictly increasing.
//! - When the 256 sequence values of one time unit are used up, the generator
//!   borrows the next time unit instead of sleeping.
//! - A clock that moves backwards keeps the last seen time unit.

use std::sync::Mutex;

use chrono::Utc;

use super::IdGenerator;
use crate::error::IdError;

const BITS_TIME: u32 = 39;
const BITS_SEQUENCE: u32 = 8;
const BITS_MACHINE: u32 = 16;

const SEQUENCE_MASK: u64 = (1 << BITS_SEQUENCE) - 1;
const MACHINE_MASK: u64 = (1 << BITS_MACHINE) - 1;

/// Time unit in milliseconds.
const UNIT_MS: i64 = 10;

/// 2014-09-01T00:00:00Z, the customary Sonyflake epoch.
const DEFAULT_START_MS: i64 = 1_409_529_600_000;

/// Decomposed fields of an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parts {
    /// Elapsed 10ms units since the generator's start time.
    pub time: u64,
    /// Sequence within the time unit.
    pub sequence: u64,
    /// Machine id.
    pub machine_id: u16,
}

#[derive(Debug)]
struct State {
    elapsed: u64,
    sequence: u64,
}

/// Time-ordered unique id generator.
#[derive(Debug)]
pub struct Sonyflake {
    start_ms: i64,
    machine_id: u16,
    state: Mutex<State>,
}

impl Sonyflake {
    /// Creates a generator with a random machine id and the default epoch.
    pub fn new() -> Self {
        Self::with_machine_id(rand::random::<u16>())
    }

    /// Creates a generator with a fixed machine id and the default epoch.
    pub fn with_machine_id(machine_id: u16) -> Self {
        Self {
            start_ms: DEFAULT_START_MS,
            machine_id,
            state: Mutex::new(State {
                elapsed: 0,
                sequence: SEQUENCE_MASK,
            }),
        }
    }

    /// Overrides the epoch (milliseconds since the Unix epoch).
    ///
    /// The epoch must not lie in the future; otherwise [`IdGenerator::next_id`]
    /// fails with [`IdError::StartInFuture`].
    pub fn with_start_ms(mut self, start_ms: i64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Machine id stamped into every id.
    pub fn machine_id(&self) -> u16 {
        self.machine_id
    }

    /// Splits an id into its fields.
    pub fn decompose(id: u64) -> Parts {
        Parts {
            time: id >> (BITS_SEQUENCE + BITS_MACHINE),
            sequence: (id >> BITS_MACHINE) & SEQUENCE_MASK,
            machine_id: (id & MACHINE_MASK) as u16,
        }
    }

    fn current_elapsed(&self) -> Result<u64, IdError> {
        let now = Utc::now().timestamp_millis();
        if now < self.start_ms {
            return Err(IdError::StartInFuture);
        }
        Ok(((now - self.start_ms) / UNIT_MS) as u64)
    }
}

impl Default for Sonyflake {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for Sonyflake {
    fn next_id(&self) -> Result<u64, IdError> {
        let current = self.current_elapsed()?;

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.elapsed < current {
            state.elapsed = current;
            state.sequence = 0;
        } else {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                state.elapsed += 1;
            }
        }

        if state.elapsed >= 1 << BITS_TIME {
            return Err(IdError::TimeOverflow);
        }

        let id = (state.elapsed << (BITS_SEQUENCE + BITS_MACHINE))
            | (state.sequence << BITS_MACHINE)
            | u64::from(self.machine_id);
        if id == 0 {
            return Err(IdError::Zero);
        }
        Ok(id)
    }
}
