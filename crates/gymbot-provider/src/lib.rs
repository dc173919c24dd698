//! `gymbot-provider` — the booking-chain capability the engine consumes.
//!
//! The trait is deliberately narrow: authenticate, create a booking, cancel
//! a booking. "No matching slot" is an ordinary outcome, not an error, so
//! `create_booking` returns a tri-state rather than raising for it; transport
//! failures (including timeouts) surface as [`ProviderError`] and the caller
//! treats them uniformly for retry purposes.

pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use gymbot_core::ClassTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider rejected the credentials: {0}")]
    AuthRejected(String),

    #[error("Unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Authenticated provider context, returned by `authenticate` and threaded
/// through the booking calls.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub token: String,
    pub user_id: i64,
    /// The user's home center, distinct from the center being booked.
    pub center_id: i64,
}

/// Result of a create-booking call that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { booking_id: String },
    /// The provider has no class matching name + start time on that date.
    SlotNotFound,
}

#[async_trait]
pub trait BookingProvider: Send + Sync {
    async fn authenticate(&self, username: &str, secret: &str) -> Result<ProviderSession>;

    async fn create_booking(
        &self,
        session: &ProviderSession,
        center: &str,
        class_date: NaiveDate,
        class_time: ClassTime,
        class_name: &str,
    ) -> Result<CreateOutcome>;

    async fn cancel_booking(
        &self,
        session: &ProviderSession,
        center: &str,
        booking_id: &str,
    ) -> Result<()>;
}
