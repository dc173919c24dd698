use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gymbot_provider::BookingProvider;
use gymbot_scheduler::{next_occurrence, JobFire, JobSpec, SchedulerHandle};
use gymbot_store::{Reservation, Store};
use gymbot_vault::CredentialVault;
use tracing::{info, warn};

use crate::engine::{ExecutionEngine, ExecutionOutcome};
use crate::error::Result;

/// What `on_create` did: the outcome of the immediate one-shot (if the first
/// occurrence was already inside the booking window) and the instant the
/// standing trigger will fire next.
#[derive(Debug)]
pub struct CreateSummary {
    pub immediate: Option<ExecutionOutcome>,
    pub next_fire: DateTime<Utc>,
}

/// Glue between reservation CRUD and the scheduling core.
///
/// Owns the two scheduling actions that share the reservation id: the
/// one-shot immediate execution (never stored) and the standing weekly
/// trigger (the only thing that persists in the job registry).
pub struct LifecycleManager {
    store: Store,
    scheduler: Arc<SchedulerHandle>,
    engine: Arc<ExecutionEngine>,
    vault: Arc<CredentialVault>,
    provider: Arc<dyn BookingProvider>,
    /// Provider booking window: how far ahead a class becomes bookable.
    window: Duration,
}

impl LifecycleManager {
    pub fn new(
        store: Store,
        scheduler: Arc<SchedulerHandle>,
        engine: Arc<ExecutionEngine>,
        vault: Arc<CredentialVault>,
        provider: Arc<dyn BookingProvider>,
        window_hours: i64,
    ) -> Self {
        Self {
            store,
            scheduler,
            engine,
            vault,
            provider,
            window: Duration::hours(window_hours),
        }
    }

    /// Wire up a freshly persisted reservation.
    ///
    /// Errors from the immediate execution propagate so the creating request
    /// can report them; the weekly trigger is registered regardless of
    /// whether an immediate attempt ran.
    pub async fn on_create(&self, reservation: &Reservation) -> Result<CreateSummary> {
        self.on_create_at(reservation, Utc::now()).await
    }

    pub(crate) async fn on_create_at(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> Result<CreateSummary> {
        let occurrence = next_occurrence(now, reservation.weekday, reservation.time);

        // next_occurrence may legitimately return an instant earlier today;
        // the window check below is the guard that makes it actionable.
        let immediate = if occurrence > now && occurrence - now <= self.window {
            info!(reservation_id = %reservation.id, occurrence = %occurrence,
                  "first occurrence already inside the booking window; executing now");
            let fire = JobFire {
                reservation_id: reservation.id.clone(),
                time: reservation.time,
                center: reservation.center.clone(),
                class_name: reservation.class_name.clone(),
                fired_at: occurrence,
                deferred: false,
            };
            Some(self.engine.execute(&fire).await?)
        } else {
            None
        };

        // The standing trigger fires the day before the class, when the
        // provider opens the window for it.
        let job = self.scheduler.schedule(&JobSpec {
            reservation_id: reservation.id.clone(),
            weekday: reservation.weekday.prev(),
            time: reservation.time,
            center: reservation.center.clone(),
            class_name: reservation.class_name.clone(),
        })?;

        Ok(CreateSummary {
            immediate,
            next_fire: job.next_fire,
        })
    }

    /// Pause/resume. Store-only by design: the trigger stays armed with its
    /// phase intact and the engine reads the flag at fire time.
    pub fn on_toggle_active(&self, reservation_id: &str, active: bool) -> Result<()> {
        self.store.set_active(reservation_id, active)?;
        info!(reservation_id = %reservation_id, active, "reservation active flag changed");
        Ok(())
    }

    /// Tear down a reservation: trigger first (so no new fire can start
    /// against a vanishing row), then a best-effort upstream cancellation of
    /// a still-upcoming booked class, then the row itself.
    pub async fn on_delete(&self, reservation_id: &str) -> Result<()> {
        self.scheduler.cancel(reservation_id)?;

        let reservation = self.store.reservation(reservation_id)?;
        if let (Some(booking_id), Some(confirmed_at)) = (
            reservation.provider_booking_id.as_deref(),
            reservation.confirmed_at,
        ) {
            if confirmed_at > Utc::now() {
                self.cancel_upstream(&reservation, booking_id).await;
            }
        }

        self.store.append_log(
            &reservation.user_id,
            Some(&reservation.id),
            &format!(
                "reservation deleted: {} {} at {}",
                reservation.weekday, reservation.class_name, reservation.time
            ),
        )?;
        self.store.delete_reservation(reservation_id)?;
        Ok(())
    }

    /// Cancel the provider-side booking. Best-effort: every failure is
    /// logged and swallowed; the local deletion proceeds either way.
    async fn cancel_upstream(&self, reservation: &Reservation, booking_id: &str) {
        let user = match self.store.user(&reservation.user_id) {
            Ok(user) => user,
            Err(e) => {
                warn!(reservation_id = %reservation.id, "upstream cancel skipped: {e}");
                return;
            }
        };
        let secret = match self.vault.decrypt(&user.password_cipher) {
            Ok(secret) => secret,
            Err(e) => {
                warn!(reservation_id = %reservation.id, "upstream cancel skipped: {e}");
                return;
            }
        };
        let session = match self.provider.authenticate(&user.id, &secret).await {
            Ok(session) => session,
            Err(e) => {
                warn!(reservation_id = %reservation.id, "upstream cancel skipped: {e}");
                return;
            }
        };
        match self
            .provider
            .cancel_booking(&session, &reservation.center, booking_id)
            .await
        {
            Ok(()) => info!(reservation_id = %reservation.id, %booking_id, "upstream booking cancelled"),
            Err(e) => warn!(reservation_id = %reservation.id, "upstream cancel failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RetryPolicy;
    use crate::testutil::{fixtures, Fixtures};
    use chrono::{Datelike, TimeZone, Timelike};
    use gymbot_core::Weekday;
    use gymbot_provider::CreateOutcome;
    use gymbot_store::{NewReservation, StoreError};
    use rusqlite::Connection;

    fn manager(fx: &Fixtures) -> (LifecycleManager, Arc<SchedulerHandle>) {
        let scheduler =
            Arc::new(SchedulerHandle::new(Connection::open_in_memory().unwrap()).unwrap());
        let engine = Arc::new(ExecutionEngine::new(
            fx.store.clone(),
            Arc::clone(&fx.vault),
            fx.provider.clone(),
            fx.notifier.clone(),
            RetryPolicy {
                attempts: 2,
                delay: std::time::Duration::from_millis(5),
            },
        ));
        let manager = LifecycleManager::new(
            fx.store.clone(),
            Arc::clone(&scheduler),
            engine,
            Arc::clone(&fx.vault),
            fx.provider.clone(),
            24,
        );
        (manager, scheduler)
    }

    fn reservation_for(fx: &Fixtures, weekday: Weekday, time: &str) -> gymbot_store::Reservation {
        let cipher = fx.vault.encrypt("secret").unwrap();
        fx.store.upsert_user("member@example.com", &cipher).unwrap();
        fx.store
            .create_reservation(&NewReservation {
                user_id: "member@example.com".to_string(),
                weekday,
                time: time.parse().unwrap(),
                center: "134".to_string(),
                class_name: "Cycling".to_string(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn monday_class_created_sunday_morning_runs_immediately() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        fx.provider
            .script(Ok(CreateOutcome::Created { booking_id: "42".into() }));
        let reservation = reservation_for(&fx, Weekday::Monday, "10:00");

        // Sunday 2026-08-02 11:00: Monday 10:00 is 23 hours out, inside
        // the 24 h booking window, so the one-shot runs synchronously.
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 11, 0, 0).unwrap();
        let summary = manager.on_create_at(&reservation, now).await.unwrap();

        assert_eq!(
            summary.immediate,
            Some(ExecutionOutcome::Confirmed { booking_id: "42".into() })
        );
        // Class booked for Monday 10:00, not for the attempt instant.
        let confirmed = fx.store.reservation(&reservation.id).unwrap().confirmed_at.unwrap();
        assert_eq!(confirmed, Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap());

        // The standing trigger is armed for Sunday (day before Monday) 10:00.
        let job = scheduler.job(&reservation.id).unwrap().expect("job registered");
        assert_eq!(job.weekday, Weekday::Sunday);
        assert_eq!(job.time.to_string(), "10:00");
    }

    #[tokio::test]
    async fn creation_outside_the_window_only_arms_the_trigger() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        let reservation = reservation_for(&fx, Weekday::Friday, "18:00");

        // Sunday: Friday 18:00 is five days out.
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
        let summary = manager.on_create_at(&reservation, now).await.unwrap();

        assert!(summary.immediate.is_none());
        assert_eq!(fx.provider.create_calls(), 0);
        let job = scheduler.job(&reservation.id).unwrap().expect("job registered");
        assert_eq!(job.weekday, Weekday::Thursday);
    }

    #[tokio::test]
    async fn same_day_earlier_time_is_not_actionable() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        let reservation = reservation_for(&fx, Weekday::Sunday, "08:00");

        // Sunday 09:00: the naive occurrence is today 08:00, in the past.
        // The window check must reject it instead of booking backwards.
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
        let summary = manager.on_create_at(&reservation, now).await.unwrap();

        assert!(summary.immediate.is_none());
        assert_eq!(fx.provider.create_calls(), 0);
        assert!(scheduler.job(&reservation.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn recreate_after_delete_rederives_the_same_trigger() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        let reservation = reservation_for(&fx, Weekday::Friday, "18:00");
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();

        let first = manager.on_create_at(&reservation, now).await.unwrap();
        scheduler.cancel(&reservation.id).unwrap();
        let second = manager.on_create_at(&reservation, now).await.unwrap();

        assert_eq!(first.next_fire.weekday(), second.next_fire.weekday());
        assert_eq!(first.next_fire.hour(), second.next_fire.hour());
        assert_eq!(first.next_fire.minute(), second.next_fire.minute());
        // still exactly one job
        assert_eq!(scheduler.list_jobs().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn toggle_never_touches_the_scheduler() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        let reservation = reservation_for(&fx, Weekday::Friday, "18:00");
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
        manager.on_create_at(&reservation, now).await.unwrap();

        manager.on_toggle_active(&reservation.id, false).unwrap();

        assert!(!fx.store.reservation(&reservation.id).unwrap().active);
        // trigger still armed, phase intact
        assert!(scheduler.job(&reservation.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_cancels_trigger_row_and_upstream_booking() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        let reservation = reservation_for(&fx, Weekday::Friday, "18:00");
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap();
        manager.on_create_at(&reservation, now).await.unwrap();

        // A confirmed, still-upcoming class is cancelled at the provider too.
        fx.store
            .confirm(&reservation.id, Utc::now() + Duration::hours(20), "555")
            .unwrap();

        manager.on_delete(&reservation.id).await.unwrap();

        assert!(scheduler.job(&reservation.id).unwrap().is_none());
        assert!(matches!(
            fx.store.reservation(&reservation.id),
            Err(StoreError::ReservationNotFound { .. })
        ));
        assert_eq!(fx.provider.cancel_calls(), 1);
        // audit trail survives with the FK nulled
        let logs = fx.store.logs_for_user(&reservation.user_id).unwrap();
        assert!(logs.iter().any(|l| l.message.contains("reservation deleted")));
        assert!(logs.iter().all(|l| l.reservation_id.is_none()));
    }

    #[tokio::test]
    async fn delete_tolerates_a_job_that_was_never_scheduled() {
        let fx = fixtures();
        let (manager, scheduler) = manager(&fx);
        let reservation = reservation_for(&fx, Weekday::Friday, "18:00");

        // No on_create, so no trigger exists; deletion still succeeds.
        manager.on_delete(&reservation.id).await.unwrap();

        assert!(scheduler.list_jobs().unwrap().is_empty());
        assert!(fx.store.reservation(&reservation.id).is_err());
        assert_eq!(fx.provider.cancel_calls(), 0);
    }
}
