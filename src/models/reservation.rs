//! Reservation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::ReservationStatus;

/// Queued claim on a book that had no free copy.
/// Queue order per book is `reservation_date`, then `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub reservation_date: DateTime<Utc>,
    pub status: ReservationStatus,
}
