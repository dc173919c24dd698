use rusqlite::Connection;

use crate::error::Result;

/// Initialise all tables for the booking domain. Safe to call on every
/// startup — CREATE IF NOT EXISTS means it's idempotent.
///
/// Log rows outlive the reservations they reference (ON DELETE SET NULL);
/// reservations are cascade-deleted with their user.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT NOT NULL PRIMARY KEY,  -- provider login email
            password_cipher TEXT NOT NULL,              -- vault-sealed, never plaintext
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS reservations (
            id                  TEXT    NOT NULL PRIMARY KEY,  -- UUID, doubles as job id
            user_id             TEXT    NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            weekday             TEXT    NOT NULL,   -- 'monday' … 'sunday'
            time                TEXT    NOT NULL,   -- 'HH:MM'
            center              TEXT    NOT NULL,   -- provider center code
            class_name          TEXT    NOT NULL,
            active              INTEGER NOT NULL DEFAULT 1,
            confirmed_at        TEXT,               -- class instant, RFC-3339, or NULL
            provider_booking_id TEXT,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL,
            UNIQUE(user_id, weekday, time, class_name)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_reservations_user ON reservations (user_id);

        CREATE TABLE IF NOT EXISTS logs (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id        TEXT NOT NULL,
            reservation_id TEXT REFERENCES reservations(id) ON DELETE SET NULL,
            message        TEXT NOT NULL,
            created_at     TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_logs_user ON logs (user_id);
        ",
    )?;
    Ok(())
}
