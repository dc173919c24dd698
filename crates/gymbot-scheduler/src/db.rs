use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// The scheduler owns this table outright — job rows are derived from
/// reservations but persisted independently so triggers survive restarts
/// without consulting the reservation store.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS booking_jobs (
            id           TEXT    NOT NULL PRIMARY KEY,  -- reservation id
            weekday      TEXT    NOT NULL,              -- fire day, 'monday' … 'sunday'
            time         TEXT    NOT NULL,              -- 'HH:MM'
            center       TEXT    NOT NULL,
            class_name   TEXT    NOT NULL,
            last_fire    TEXT,                          -- RFC-3339 or NULL
            next_fire    TEXT    NOT NULL,              -- RFC-3339
            fire_count   INTEGER NOT NULL DEFAULT 0,
            missed_count INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT    NOT NULL,
            updated_at   TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE next_fire <= ? ORDER BY next_fire
        CREATE INDEX IF NOT EXISTS idx_booking_jobs_next_fire ON booking_jobs (next_fire);
        ",
    )?;
    Ok(())
}
