use thiserror::Error;

/// Failures that escape a booking operation.
///
/// Provider, vault and notifier failures are absorbed inside the execution
/// engine (logged, no side effect this week) — what propagates here is store
/// and scheduler trouble, which the synchronous creation path must surface
/// to its caller.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Store(#[from] gymbot_store::StoreError),

    #[error(transparent)]
    Scheduler(#[from] gymbot_scheduler::SchedulerError),
}

pub type Result<T> = std::result::Result<T, BookingError>;
