//! Core engine: the fetch → resolve → persist loop.

pub mod cycle;
pub mod scheduler;

pub use cycle::IngestionCycle;
pub use scheduler::{Scheduler, SchedulerStats};
