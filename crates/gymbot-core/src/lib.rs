//! `gymbot-core` — shared configuration, errors and domain primitives.
//!
//! Everything here is dependency-light on purpose: the other crates pull in
//! their own storage / network stacks and only share the types that cross
//! subsystem boundaries (weekdays, class times, the center/class catalog and
//! the top-level config).

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{ClassTime, Weekday};
