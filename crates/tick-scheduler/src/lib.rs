//! Simulation Tick Scheduler
//!
//! Drives one physics step, one serialization and one fan-out per tick at
//! a fixed period on a dedicated OS thread.

mod scheduler;

pub use scheduler::{SchedulerConfig, TickReport, TickScheduler, TickStats};
