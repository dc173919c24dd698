//! `gymbot-scheduler` — durable weekly triggers with SQLite persistence.
//!
//! # Overview
//!
//! One trigger per active reservation, keyed by the reservation id, persisted
//! to a SQLite `booking_jobs` table the scheduler owns outright. The
//! [`engine::SchedulerEngine`] polls the table every second; a job whose
//! `next_fire` has arrived is fired onto an mpsc channel as a [`JobFire`] and
//! re-armed one week out. A job overdue by more than the misfire grace is
//! skipped, not queued.
//!
//! Because a trigger describes exactly one weekly instant, two firings of the
//! same job can never overlap; firings of different jobs are dispatched to
//! independent tasks by the consumer and are unordered relative to each other.

pub mod db;
pub mod engine;
pub mod error;
pub mod occurrence;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use occurrence::{next_occurrence, next_weekly_fire};
pub use types::{BookingJob, JobFire, JobSpec};
