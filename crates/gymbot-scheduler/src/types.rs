use chrono::{DateTime, Utc};
use gymbot_core::{ClassTime, Weekday};
use serde::{Deserialize, Serialize};

/// What the lifecycle manager registers: the fire day (the day *before* the
/// class) plus the fixed arguments forwarded on every fire.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Reservation id — doubles as the job id (1:1).
    pub reservation_id: String,
    /// Day the trigger fires, not the day of the class.
    pub weekday: Weekday,
    pub time: ClassTime,
    pub center: String,
    pub class_name: String,
}

/// A persisted trigger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingJob {
    /// Reservation id — primary key.
    pub id: String,
    pub weekday: Weekday,
    pub time: ClassTime,
    pub center: String,
    pub class_name: String,
    /// Most recent fire, if any.
    pub last_fire: Option<DateTime<Utc>>,
    /// Next planned fire; always strictly in the future after each tick.
    pub next_fire: DateTime<Utc>,
    /// Total successful fires.
    pub fire_count: u32,
    /// Occurrences skipped because they were overdue beyond the grace window.
    pub missed_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// One dispatched firing, handed to the execution engine.
#[derive(Debug, Clone)]
pub struct JobFire {
    pub reservation_id: String,
    pub time: ClassTime,
    pub center: String,
    pub class_name: String,
    /// Wall-clock time the trigger fired.
    pub fired_at: DateTime<Utc>,
    /// True for scheduler fires: the class is the day after `fired_at`.
    /// False only for the one-shot immediate path at reservation creation,
    /// where `fired_at` is the class instant itself.
    pub deferred: bool,
}
