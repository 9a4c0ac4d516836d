//! Transient and persistent state shared by the export engine.
//!
//! Nothing in here touches process globals: callers inject a [`StateStore`]
//! and a [`Clock`] and every component reads and writes through them.

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use jobs::{JobQueue, ScheduledJob};
pub use log::{LogEntry, LogLevel, LogRing, RingBufferLayer, SECURITY_TARGET};
pub use rate::RateLimiter;
pub use store::{JsonFileStore, MemoryStore, StateStore, load, save};

mod clock;
mod error;
mod jobs;
pub mod log;
mod rate;
mod store;
