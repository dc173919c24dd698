//! `gymbot-booking` — one booking attempt, end to end.
//!
//! The [`engine::ExecutionEngine`] turns a fired trigger into a provider
//! booking: re-checks the pause flag, decrypts the credential, authenticates,
//! retries the booking call on failure and records the outcome in the
//! reservation row and the audit log. The [`lifecycle::LifecycleManager`] is
//! the glue around reservation create/delete: it decides whether an
//! occurrence is already inside the booking window (immediate one-shot) and
//! keeps the standing weekly trigger in step with the reservation's life.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lifecycle;

#[cfg(test)]
mod testutil;

pub use dispatch::spawn_dispatcher;
pub use engine::{ExecutionEngine, ExecutionOutcome, RetryPolicy};
pub use error::{BookingError, Result};
pub use lifecycle::{CreateSummary, LifecycleManager};
