//! Next-occurrence arithmetic for weekly slots.

use chrono::{DateTime, Datelike, Duration, Utc};
use gymbot_core::{ClassTime, Weekday};

/// Earliest instant on or after `reference`'s date whose weekday is `weekday`
/// and whose time-of-day is `time` (seconds zeroed).
///
/// Deliberately naive: the day offset is `(target - reference_day + 7) % 7`,
/// so when the offset is 0 and `time` is earlier than `reference`'s
/// time-of-day the result is *today in the past*. Callers deciding whether an
/// occurrence is actionable must check it against the booking window
/// themselves; this function never skips ahead to next week.
pub fn next_occurrence(
    reference: DateTime<Utc>,
    weekday: Weekday,
    time: ClassTime,
) -> DateTime<Utc> {
    let reference_day = reference.weekday().num_days_from_monday() as i64;
    let offset = (weekday.index() as i64 - reference_day + 7) % 7;
    (reference + Duration::days(offset))
        .date_naive()
        .and_hms_opt(time.hour as u32, time.minute as u32, 0)
        .expect("ClassTime is range-checked at parse time")
        .and_utc()
}

/// Strictly-future variant used to arm triggers: the naive occurrence,
/// pushed one week out when it is not after `from`.
pub fn next_weekly_fire(from: DateTime<Utc>, weekday: Weekday, time: ClassTime) -> DateTime<Utc> {
    let candidate = next_occurrence(from, weekday, time);
    if candidate > from {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}
