use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{LogEntry, NewReservation, Reservation, UserAccount};

/// Map a SELECT row (column order from RESERVATION_COLUMNS) to a Reservation.
/// Centralised here so every query in this crate stays consistent.
fn row_to_reservation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reservation> {
    let weekday: String = row.get(2)?;
    let time: String = row.get(3)?;
    let confirmed_at: Option<String> = row.get(7)?;
    Ok(Reservation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        weekday: weekday.parse().map_err(|e| text_conversion(2, e))?,
        time: time.parse().map_err(|e| text_conversion(3, e))?,
        center: row.get(4)?,
        class_name: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
        confirmed_at: confirmed_at
            .map(|s| parse_instant(7, &s))
            .transpose()?,
        provider_booking_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const RESERVATION_COLUMNS: &str = "id, user_id, weekday, time, center, class_name, active,
     confirmed_at, provider_booking_id, created_at, updated_at";

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

/// Thread-safe handle over the booking-domain tables.
///
/// Wraps a single SQLite connection in a `Mutex`; each public method is one
/// logical read or read-check-write and runs under the lock, so scheduler
/// workers and request handlers never interleave inside an operation.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    // --- users -------------------------------------------------------------

    /// Insert the user or, if it exists, replace its sealed credential.
    pub fn upsert_user(&self, id: &str, password_cipher: &str) -> Result<UserAccount> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO users (id, password_cipher, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET password_cipher = ?2, updated_at = ?3",
            rusqlite::params![id, password_cipher, now],
        )?;
        db.query_row(
            "SELECT id, password_cipher, created_at, updated_at FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(UserAccount {
                    id: row.get(0)?,
                    password_cipher: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .map_err(StoreError::from)
    }

    pub fn user(&self, id: &str) -> Result<UserAccount> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, password_cipher, created_at, updated_at FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(UserAccount {
                    id: row.get(0)?,
                    password_cipher: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        ) {
            Ok(user) => Ok(user),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::UserNotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    // --- reservations ------------------------------------------------------

    /// Create a reservation with a fresh UUID. The `(user, weekday, time,
    /// class)` unique constraint maps to `DuplicateReservation`.
    pub fn create_reservation(&self, new: &NewReservation) -> Result<Reservation> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let inserted = db.execute(
            "INSERT INTO reservations
             (id, user_id, weekday, time, center, class_name, active,
              confirmed_at, provider_booking_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, NULL, NULL, ?7, ?7)",
            rusqlite::params![
                id,
                new.user_id,
                new.weekday.to_string(),
                new.time.to_string(),
                new.center,
                new.class_name,
                now
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateReservation);
            }
            Err(e) => return Err(e.into()),
        }
        debug!(reservation_id = %id, user_id = %new.user_id, "reservation created");
        drop(db);
        self.reservation(&id)
    }

    pub fn reservation(&self, id: &str) -> Result<Reservation> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"),
            [id],
            row_to_reservation,
        ) {
            Ok(r) => Ok(r),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::ReservationNotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn reservations_for_user(&self, user_id: &str) -> Result<Vec<Reservation>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations
             WHERE user_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
            .query_map([user_id], row_to_reservation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Flip the pause flag. Does not touch the scheduler: the trigger stays
    /// armed and the engine re-reads this flag at fire time.
    pub fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE reservations SET active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![active as i64, now, id],
        )?;
        if n == 0 {
            return Err(StoreError::ReservationNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Record a successful booking: the class instant and the provider's
    /// booking id, written together in one statement.
    pub fn confirm(
        &self,
        id: &str,
        class_at: DateTime<Utc>,
        provider_booking_id: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE reservations
             SET confirmed_at = ?1, provider_booking_id = ?2, updated_at = ?3
             WHERE id = ?4",
            rusqlite::params![class_at.to_rfc3339(), provider_booking_id, now, id],
        )?;
        if n == 0 {
            return Err(StoreError::ReservationNotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn delete_reservation(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM reservations WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::ReservationNotFound { id: id.to_string() });
        }
        debug!(reservation_id = %id, "reservation deleted");
        Ok(())
    }

    // --- audit log ---------------------------------------------------------

    /// Append-only; rows are never updated or deleted by the application.
    pub fn append_log(
        &self,
        user_id: &str,
        reservation_id: Option<&str>,
        message: &str,
    ) -> Result<LogEntry> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO logs (user_id, reservation_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user_id, reservation_id, message, now],
        )?;
        let id = db.last_insert_rowid();
        Ok(LogEntry {
            id,
            user_id: user_id.to_string(),
            reservation_id: reservation_id.map(String::from),
            message: message.to_string(),
            created_at: now,
        })
    }

    pub fn logs_for_user(&self, user_id: &str) -> Result<Vec<LogEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, reservation_id, message, created_at
             FROM logs WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    reservation_id: row.get(2)?,
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
