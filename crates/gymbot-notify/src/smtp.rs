//! SMTP delivery of confirmation mail (STARTTLS, async transport).

use async_trait::async_trait;
use gymbot_core::{catalog, config::SmtpConfig};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::{BookingNotice, Notifier, NotifyError, Result};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

/// Render the confirmation body. Kept pure so the template is testable
/// without a mail server.
pub fn build_body(notice: &BookingNotice) -> String {
    let center = catalog::center_name(&notice.center_code).unwrap_or(&notice.center_code);
    format!(
        "<html>\n<body>\n\
         <h2>Booking confirmed</h2>\n\
         <p>\n\
         <strong>Center:</strong> {center}<br>\n\
         <strong>Date:</strong> {date}<br>\n\
         <strong>Class:</strong> {class}<br>\n\
         <strong>Time:</strong> {time}\n\
         </p>\n\
         <p>This is an automated message, please do not reply.</p>\n\
         </body>\n</html>\n",
        date = notice.class_date.format("%Y-%m-%d"),
        class = notice.class_name,
        time = notice.class_time,
    )
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &BookingNotice) -> Result<()> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| NotifyError::Message(format!("{e}")))?,
            )
            .to(notice
                .email
                .parse()
                .map_err(|e| NotifyError::Message(format!("{e}")))?)
            .subject("Booking confirmed")
            .header(ContentType::TEXT_HTML)
            .body(build_body(notice))
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(email = %notice.email, class = %notice.class_name, "confirmation mail sent");
                Ok(())
            }
            Err(e) => {
                warn!(email = %notice.email, "confirmation mail failed: {e}");
                Err(NotifyError::Transport(e.to_string()))
            }
        }
    }
}
