use std::sync::Arc;

use gymbot_scheduler::JobFire;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::ExecutionEngine;

/// Bridge between the scheduler's fire channel and the execution engine.
///
/// Every fire gets its own task: a reservation stuck in its retry delay must
/// never hold up another reservation's fire time. There is no cooperative
/// cancellation — once spawned, a fire runs to its terminal state (the retry
/// loop is bounded, so that is a few seconds at most).
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<JobFire>,
    engine: Arc<ExecutionEngine>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("booking dispatcher started");
        while let Some(fire) = rx.recv().await {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                match engine.execute(&fire).await {
                    Ok(outcome) => {
                        debug!(reservation_id = %fire.reservation_id, ?outcome, "fire handled")
                    }
                    Err(e) => {
                        error!(reservation_id = %fire.reservation_id, "fire execution failed: {e}")
                    }
                }
            });
        }
        info!("booking dispatcher stopped: fire channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixtures;
    use chrono::Utc;
    use gymbot_provider::CreateOutcome;

    #[tokio::test]
    async fn fires_run_on_independent_tasks() {
        let fx = fixtures();
        fx.provider
            .script(Ok(CreateOutcome::Created { booking_id: "1".into() }));
        fx.provider
            .script(Ok(CreateOutcome::Created { booking_id: "2".into() }));
        let first = fx.reservation();
        let cipher = fx.vault.encrypt("secret").unwrap();
        fx.store.upsert_user("other@example.com", &cipher).unwrap();
        let second = fx
            .store
            .create_reservation(&gymbot_store::NewReservation {
                user_id: "other@example.com".to_string(),
                weekday: gymbot_core::Weekday::Tuesday,
                time: "18:00".parse().unwrap(),
                center: "134".to_string(),
                class_name: "Yoga".to_string(),
            })
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_dispatcher(rx, Arc::new(fx.engine()));

        for id in [&first.id, &second.id] {
            tx.send(JobFire {
                reservation_id: id.clone(),
                time: "10:00".parse().unwrap(),
                center: "134".to_string(),
                class_name: "Cycling".to_string(),
                fired_at: Utc::now(),
                deferred: true,
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        // The dispatcher has drained the channel; wait for the spawned
        // workers to reach the provider.
        for _ in 0..100 {
            if fx.provider.create_calls() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(fx.provider.create_calls(), 2);
    }
}
