use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gymbot_core::config::BookingConfig;
use gymbot_notify::{BookingNotice, Notifier};
use gymbot_provider::{BookingProvider, CreateOutcome};
use gymbot_scheduler::JobFire;
use gymbot_store::Store;
use gymbot_vault::CredentialVault;
use tracing::{info, warn};

use crate::error::Result;

/// Attempt budget for one fire. Deliberately blind to the failure category:
/// "no matching slot" burns an attempt exactly like a timeout does.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total create-booking calls per fire, including the first.
    pub attempts: u32,
    /// Fixed pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Terminal state of one execution. Every variant returns control to the
/// scheduler; none affects the standing weekly trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The reservation is paused; nothing was attempted.
    Skipped,
    /// Credential decryption or provider authentication failed.
    AuthFailed,
    /// The attempt budget ran out; the reservation stays active and
    /// unconfirmed, next week's fire tries again independently.
    Failed,
    Confirmed { booking_id: String },
}

/// Orchestrates one booking attempt against the provider.
pub struct ExecutionEngine {
    store: Store,
    vault: Arc<CredentialVault>,
    provider: Arc<dyn BookingProvider>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

/// The instant of the class this fire targets: the day after the attempt for
/// scheduler fires, the fire instant itself for the immediate one-shot —
/// with the reservation's time-of-day overwritten in both cases.
fn class_instant(fire: &JobFire) -> DateTime<Utc> {
    let base = if fire.deferred {
        fire.fired_at + chrono::Duration::days(1)
    } else {
        fire.fired_at
    };
    base.date_naive()
        .and_hms_opt(fire.time.hour as u32, fire.time.minute as u32, 0)
        .expect("ClassTime is range-checked at parse time")
        .and_utc()
}

impl ExecutionEngine {
    pub fn new(
        store: Store,
        vault: Arc<CredentialVault>,
        provider: Arc<dyn BookingProvider>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            vault,
            provider,
            notifier,
            retry,
        }
    }

    /// Run one fire to a terminal state.
    ///
    /// Provider, vault and notifier failures are absorbed here — logged,
    /// "no side effect this week". Only store failures propagate, so the
    /// synchronous immediate path can report them to the creating request.
    pub async fn execute(&self, fire: &JobFire) -> Result<ExecutionOutcome> {
        let reservation = self.store.reservation(&fire.reservation_id)?;
        let class_at = class_instant(fire);
        let class_date = class_at.date_naive();

        // Authoritative pause check, re-read at fire time: a cancellation
        // that flipped the flag before this read wins the race; one that
        // lands after it waits out this attempt.
        if !reservation.active {
            info!(reservation_id = %reservation.id, "fire skipped: reservation is paused");
            self.store.append_log(
                &reservation.user_id,
                Some(&reservation.id),
                &format!(
                    "{} on {} at {} not booked: reservation is paused",
                    reservation.class_name, class_date, fire.time
                ),
            )?;
            return Ok(ExecutionOutcome::Skipped);
        }

        self.store.append_log(
            &reservation.user_id,
            Some(&reservation.id),
            &format!(
                "booking attempt started: {} on {} at {} (center {})",
                reservation.class_name, class_date, fire.time, reservation.center
            ),
        )?;

        let user = self.store.user(&reservation.user_id)?;
        let secret = match self.vault.decrypt(&user.password_cipher) {
            Ok(secret) => secret,
            Err(e) => {
                warn!(reservation_id = %reservation.id, "credential decryption failed: {e}");
                self.store.append_log(
                    &reservation.user_id,
                    Some(&reservation.id),
                    &format!("credential decryption failed: {e}"),
                )?;
                return Ok(ExecutionOutcome::AuthFailed);
            }
        };

        let session = match self.provider.authenticate(&user.id, &secret).await {
            Ok(session) => session,
            Err(e) => {
                // Retrying with the same credential is pointless; the weekly
                // trigger stays intact for next week.
                warn!(reservation_id = %reservation.id, "provider authentication failed: {e}");
                self.store.append_log(
                    &reservation.user_id,
                    Some(&reservation.id),
                    &format!("provider authentication failed: {e}"),
                )?;
                return Ok(ExecutionOutcome::AuthFailed);
            }
        };

        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            let result = self
                .provider
                .create_booking(
                    &session,
                    &reservation.center,
                    class_date,
                    fire.time,
                    &reservation.class_name,
                )
                .await;

            let cause = match result {
                Ok(CreateOutcome::Created { booking_id }) => {
                    self.store.confirm(&reservation.id, class_at, &booking_id)?;
                    self.store.append_log(
                        &reservation.user_id,
                        Some(&reservation.id),
                        &format!(
                            "booked {} on {} at {} (booking id {booking_id})",
                            reservation.class_name, class_date, fire.time
                        ),
                    )?;
                    info!(reservation_id = %reservation.id, %booking_id, "booking confirmed");

                    let notice = BookingNotice {
                        email: user.id.clone(),
                        center_code: reservation.center.clone(),
                        class_date,
                        class_name: reservation.class_name.clone(),
                        class_time: fire.time,
                    };
                    // Best-effort: a failed confirmation mail never unwinds
                    // the booking.
                    if let Err(e) = self.notifier.notify(&notice).await {
                        warn!(reservation_id = %reservation.id, "confirmation notification failed: {e}");
                    }
                    return Ok(ExecutionOutcome::Confirmed { booking_id });
                }
                Ok(CreateOutcome::SlotNotFound) => "no matching class at that date and time".to_string(),
                Err(e) => e.to_string(),
            };

            warn!(reservation_id = %reservation.id, attempt, "booking attempt failed: {cause}");
            self.store.append_log(
                &reservation.user_id,
                Some(&reservation.id),
                &format!("booking attempt {attempt}/{attempts} failed: {cause}"),
            )?;

            if attempt < attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        self.store.append_log(
            &reservation.user_id,
            Some(&reservation.id),
            &format!("booking failed after {attempts} attempts; the next weekly trigger will retry"),
        )?;
        Ok(ExecutionOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixtures;
    use chrono::{Datelike, TimeZone};
    use gymbot_provider::ProviderError;

    fn fire_on_sunday(reservation_id: &str, deferred: bool) -> JobFire {
        JobFire {
            reservation_id: reservation_id.to_string(),
            time: "10:00".parse().unwrap(),
            center: "134".to_string(),
            class_name: "Cycling".to_string(),
            // Sunday 2026-08-02, one second past the nominal trigger time.
            fired_at: Utc.with_ymd_and_hms(2026, 8, 2, 10, 0, 1).unwrap(),
            deferred,
        }
    }

    #[tokio::test]
    async fn paused_reservation_is_one_log_entry_and_zero_provider_calls() {
        let fx = fixtures();
        let reservation = fx.reservation();
        fx.store.set_active(&reservation.id, false).unwrap();

        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, true)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::Skipped);
        assert_eq!(fx.store.logs_for_user(&reservation.user_id).unwrap().len(), 1);
        assert_eq!(fx.provider.auth_calls(), 0);
        assert_eq!(fx.provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn auth_failure_ends_the_fire_without_booking_calls() {
        let fx = fixtures();
        fx.provider.reject_auth();
        let reservation = fx.reservation();

        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, true)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::AuthFailed);
        assert_eq!(fx.provider.auth_calls(), 1);
        assert_eq!(fx.provider.create_calls(), 0);
        assert!(fx.store.reservation(&reservation.id).unwrap().confirmed_at.is_none());
    }

    #[tokio::test]
    async fn decrypt_failure_is_treated_like_an_auth_failure() {
        let fx = fixtures();
        let reservation = fx.reservation();
        fx.store.upsert_user(&reservation.user_id, "not a vault token").unwrap();

        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, true)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::AuthFailed);
        assert_eq!(fx.provider.auth_calls(), 0);
        assert_eq!(fx.provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_attempts_leave_the_reservation_unconfirmed() {
        let fx = fixtures();
        fx.provider.script(Err(ProviderError::Timeout));
        fx.provider.script(Err(ProviderError::Transport("503".into())));
        let reservation = fx.reservation();

        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, true)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::Failed);
        assert_eq!(fx.provider.create_calls(), 2);
        // attempts are separated by the configured delay
        let gap = fx.provider.gap_between_calls(0, 1);
        assert!(gap >= fx.retry.delay, "gap {gap:?} shorter than configured delay");

        let loaded = fx.store.reservation(&reservation.id).unwrap();
        assert!(loaded.confirmed_at.is_none());
        assert!(loaded.active, "a failed week must not deactivate the reservation");

        let logs = fx.store.logs_for_user(&reservation.user_id).unwrap();
        let last = &logs.last().unwrap().message;
        assert!(last.contains("failed after 2 attempts"), "unexpected final log: {last}");
    }

    #[tokio::test]
    async fn slot_not_found_burns_attempts_like_any_failure() {
        let fx = fixtures();
        fx.provider.script(Ok(CreateOutcome::SlotNotFound));
        fx.provider.script(Ok(CreateOutcome::SlotNotFound));
        let reservation = fx.reservation();

        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, true)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::Failed);
        assert_eq!(fx.provider.create_calls(), 2);
        assert_eq!(fx.notifier.count(), 0);
    }

    #[tokio::test]
    async fn success_on_second_attempt_confirms_the_class_instant() {
        let fx = fixtures();
        fx.provider.script(Err(ProviderError::Timeout));
        fx.provider.script(Ok(CreateOutcome::Created { booking_id: "777".into() }));
        let reservation = fx.reservation();

        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, true)).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::Confirmed { booking_id: "777".into() });
        assert_eq!(fx.provider.create_calls(), 2);
        assert_eq!(fx.notifier.count(), 1);

        let loaded = fx.store.reservation(&reservation.id).unwrap();
        // Fired Sunday 10:00:01, deferred: the class is Monday at 10:00:00 —
        // attempt day + 1, time overwritten, seconds zeroed.
        let confirmed = loaded.confirmed_at.expect("confirmed_at set");
        assert_eq!(confirmed, Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap());
        assert_eq!(confirmed.weekday(), chrono::Weekday::Mon);
        assert_eq!(loaded.provider_booking_id.as_deref(), Some("777"));
    }

    #[tokio::test]
    async fn immediate_fire_books_the_fire_day_itself() {
        let fx = fixtures();
        fx.provider.script(Ok(CreateOutcome::Created { booking_id: "1".into() }));
        let reservation = fx.reservation();

        // Not deferred: fired_at *is* the class instant.
        let outcome = fx.engine().execute(&fire_on_sunday(&reservation.id, false)).await.unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Confirmed { .. }));
        let confirmed = fx.store.reservation(&reservation.id).unwrap().confirmed_at.unwrap();
        assert_eq!(confirmed, Utc.with_ymd_and_hms(2026, 8, 2, 10, 0, 0).unwrap());
    }
}
