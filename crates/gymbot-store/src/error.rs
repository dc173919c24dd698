use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Reservation not found: {id}")]
    ReservationNotFound { id: String },

    /// The `(user, weekday, time, class)` unique constraint was hit.
    #[error("Reservation already exists for this user, weekday, time and class")]
    DuplicateReservation,
}

pub type Result<T> = std::result::Result<T, StoreError>;
