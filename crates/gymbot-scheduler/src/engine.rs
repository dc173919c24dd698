use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::{
    db::init_db,
    error::Result,
    occurrence::next_weekly_fire,
    types::{BookingJob, JobFire, JobSpec},
};

/// Map a SELECT row (column order from JOB_COLUMNS) to a BookingJob.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookingJob> {
    let weekday: String = row.get(1)?;
    let time: String = row.get(2)?;
    let last_fire: Option<String> = row.get(5)?;
    let next_fire: String = row.get(6)?;
    Ok(BookingJob {
        id: row.get(0)?,
        weekday: weekday.parse().map_err(|e| text_conversion(1, e))?,
        time: time.parse().map_err(|e| text_conversion(2, e))?,
        center: row.get(3)?,
        class_name: row.get(4)?,
        last_fire: last_fire.map(|s| parse_instant(5, &s)).transpose()?,
        next_fire: parse_instant(6, &next_fire)?,
        fire_count: row.get(7)?,
        missed_count: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const JOB_COLUMNS: &str = "id, weekday, time, center, class_name, last_fire, next_fire,
     fire_count, missed_count, created_at, updated_at";

fn text_conversion(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_instant(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_conversion(idx, e))
}

/// Shared handle for trigger management (schedule/cancel/list) while the
/// engine loop runs.
///
/// Uses its own `Connection` so request handlers can manage jobs without
/// conflicting with the engine's polling queries.
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a weekly trigger. Re-registering an existing id replaces the
    /// trigger in place (no duplicate firings), preserving its fire counters.
    pub fn schedule(&self, spec: &JobSpec) -> Result<BookingJob> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = next_weekly_fire(now, spec.weekday, spec.time).to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO booking_jobs
             (id, weekday, time, center, class_name, last_fire, next_fire,
              fire_count, missed_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 0, 0, ?7, ?7)
             ON CONFLICT(id) DO UPDATE SET
                weekday = ?2, time = ?3, center = ?4, class_name = ?5,
                next_fire = ?6, updated_at = ?7",
            rusqlite::params![
                spec.reservation_id,
                spec.weekday.to_string(),
                spec.time.to_string(),
                spec.center,
                spec.class_name,
                next,
                now_str
            ],
        )?;
        info!(job_id = %spec.reservation_id, fire_day = %spec.weekday, time = %spec.time,
              next_fire = %next, "weekly trigger registered");

        conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM booking_jobs WHERE id = ?1"),
            [&spec.reservation_id],
            row_to_job,
        )
        .map_err(Into::into)
    }

    /// Remove a trigger. Idempotent: cancelling an id that was never
    /// scheduled is a no-op — logged, not an error — and returns `false`.
    pub fn cancel(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM booking_jobs WHERE id = ?1", [id])?;
        if n == 0 {
            info!(job_id = %id, "cancel requested for a job that was not scheduled");
            return Ok(false);
        }
        info!(job_id = %id, "trigger cancelled");
        Ok(true)
    }

    pub fn job(&self, id: &str) -> Result<Option<BookingJob>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM booking_jobs WHERE id = ?1"),
            [id],
            row_to_job,
        ) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All triggers ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<BookingJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM booking_jobs ORDER BY created_at"
        ))?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}

/// Core scheduler loop: polls the job table and emits [`JobFire`]s.
pub struct SchedulerEngine {
    conn: Connection,
    /// Fired jobs are sent here for dispatch to execution workers.
    fired_tx: mpsc::Sender<JobFire>,
    /// How far past its nominal instant a trigger may still fire. Beyond
    /// this the occurrence is skipped, not queued — also what re-arms stale
    /// triggers after the process was down for a while.
    grace: Duration,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    pub fn new(conn: Connection, fired_tx: mpsc::Sender<JobFire>, grace_secs: u64) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            fired_tx,
            grace: Duration::seconds(grace_secs as i64),
        })
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()) {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Process all jobs whose next_fire has arrived.
    fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        let now_str = now.to_rfc3339();

        // Collect eagerly inside the block so `stmt` is dropped before we
        // borrow `self.conn` again for the UPDATEs below.
        let due: Vec<BookingJob> = {
            let mut stmt = self.conn.prepare_cached(&format!(
                "SELECT {JOB_COLUMNS} FROM booking_jobs
                 WHERE next_fire <= ?1 ORDER BY next_fire"
            ))?;
            let rows = stmt
                .query_map([&now_str], row_to_job)?
                .filter_map(|r| match r {
                    Ok(job) => Some(job),
                    Err(e) => {
                        error!("bad job row skipped: {e}");
                        None
                    }
                })
                .collect();
            rows
        };

        for job in due {
            let next = next_weekly_fire(now, job.weekday, job.time).to_rfc3339();

            if now - job.next_fire > self.grace {
                // The nominal instant is too far gone; this week's occurrence
                // is lost rather than delivered late.
                warn!(job_id = %job.id, scheduled = %job.next_fire,
                      "fire window missed beyond grace; skipping occurrence");
                self.conn.execute(
                    "UPDATE booking_jobs
                     SET missed_count = missed_count + 1, next_fire = ?1, updated_at = ?2
                     WHERE id = ?3",
                    rusqlite::params![next, now_str, job.id],
                )?;
                continue;
            }

            info!(job_id = %job.id, run = job.fire_count + 1, next_fire = %next, "trigger fired");
            self.conn.execute(
                "UPDATE booking_jobs
                 SET last_fire = ?1, next_fire = ?2, fire_count = fire_count + 1,
                     updated_at = ?1
                 WHERE id = ?3",
                rusqlite::params![now_str, next, job.id],
            )?;

            let fire = JobFire {
                reservation_id: job.id.clone(),
                time: job.time,
                center: job.center,
                class_name: job.class_name,
                fired_at: now,
                deferred: true,
            };
            // try_send never blocks the tick loop; a full channel drops the
            // fire with a warning rather than stalling other triggers.
            if self.fired_tx.try_send(fire).is_err() {
                warn!(job_id = %job.id, "dispatch channel full or closed — fire dropped");
            }
        }
        Ok(())
    }
}
