//! `gymbot-notify` — booking confirmation delivery.
//!
//! Strictly fire-and-forget from the engine's point of view: a notification
//! failure is logged here and never propagated, retried or allowed to affect
//! the booking that triggered it.

pub mod smtp;

use async_trait::async_trait;
use chrono::NaiveDate;
use gymbot_core::ClassTime;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("Invalid mail address or message: {0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

/// What a confirmation message needs to say.
#[derive(Debug, Clone)]
pub struct BookingNotice {
    /// Recipient; the provider login email doubles as the contact address.
    pub email: String,
    /// Provider center code; rendered back to the public name when known.
    pub center_code: String,
    pub class_date: NaiveDate,
    pub class_name: String,
    pub class_time: ClassTime,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &BookingNotice) -> Result<()>;
}

/// Stand-in when SMTP is not configured: succeeds after a debug log so the
/// engine's best-effort call stays a no-op.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, notice: &BookingNotice) -> Result<()> {
        debug!(email = %notice.email, class = %notice.class_name, "smtp not configured; confirmation dropped");
        Ok(())
    }
}
