use chrono::{DateTime, Duration, Utc};
use gymbot_core::{ClassTime, Weekday};
use serde::{Deserialize, Serialize};

/// A registered user. The id is the provider login email; the password is
/// stored only in vault-sealed form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub password_cipher: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Everything needed to create a reservation row; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: String,
    pub weekday: Weekday,
    pub time: ClassTime,
    pub center: String,
    pub class_name: String,
}

/// A user's standing weekly class slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// UUID v4 — stable for the row's lifetime and reused as the scheduler
    /// job id (1:1).
    pub id: String,
    pub user_id: String,
    pub weekday: Weekday,
    pub time: ClassTime,
    /// Provider center code, e.g. "134".
    pub center: String,
    pub class_name: String,
    /// User-controlled pause flag; read by the execution engine at fire time.
    pub active: bool,
    /// Instant of the class last successfully booked — the class date/time,
    /// not the attempt date/time.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Id returned by the provider on booking creation; needed to cancel.
    pub provider_booking_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Reservation {
    /// Whether the reservation currently counts as confirmed: the booked
    /// class lies within the next 24 hours, or started less than an hour ago.
    pub fn is_confirmed(&self, now: DateTime<Utc>) -> bool {
        let Some(confirmed_at) = self.confirmed_at else {
            return false;
        };
        let remaining = confirmed_at - now;
        let elapsed = now - confirmed_at;
        (remaining >= Duration::zero() && remaining <= Duration::days(1))
            || (elapsed >= Duration::zero() && elapsed < Duration::hours(1))
    }
}

/// Append-only audit record. Never updated or deleted; the reservation link
/// is nulled when the reservation goes away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: String,
    pub reservation_id: Option<String>,
    pub message: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(confirmed_at: Option<DateTime<Utc>>) -> Reservation {
        Reservation {
            id: "r1".into(),
            user_id: "u@example.com".into(),
            weekday: Weekday::Monday,
            time: "10:00".parse().unwrap(),
            center: "134".into(),
            class_name: "Yoga".into(),
            active: true,
            confirmed_at,
            provider_booking_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn unconfirmed_without_date() {
        let now = Utc::now();
        assert!(!reservation(None).is_confirmed(now));
    }

    #[test]
    fn confirmed_inside_24h_window() {
        let now = Utc::now();
        assert!(reservation(Some(now + Duration::hours(23))).is_confirmed(now));
        assert!(!reservation(Some(now + Duration::hours(25))).is_confirmed(now));
    }

    #[test]
    fn confirmed_shortly_after_class_start() {
        let now = Utc::now();
        assert!(reservation(Some(now - Duration::minutes(30))).is_confirmed(now));
        assert!(!reservation(Some(now - Duration::hours(2))).is_confirmed(now));
    }
}
