//! Reservation queue: FIFO claims on books with no free copy

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{Caller, Reservation, ReservationStatus},
    repository::{CirculationTx, Repository},
};

#[derive(Clone)]
pub struct ReservationQueue {
    repository: Repository,
}

impl ReservationQueue {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Append a pending reservation, or hand back the user's existing
    /// pending one for the same book.
    pub async fn enqueue(
        tx: &mut dyn CirculationTx,
        user_id: i32,
        book_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        if let Some(existing) = tx.find_pending_reservation(user_id, book_id).await? {
            return Ok(existing);
        }
        tx.insert_reservation(user_id, book_id, at).await
    }

    /// Oldest pending reservation for a book. Does not dequeue.
    pub async fn peek_earliest(tx: &mut dyn CirculationTx, book_id: i32) -> AppResult<Option<Reservation>> {
        tx.earliest_pending_reservation(book_id).await
    }

    /// Mark the user's pending reservation for a book as fulfilled, if any
    pub async fn fulfill_for(
        tx: &mut dyn CirculationTx,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Reservation>> {
        match tx.find_pending_reservation(user_id, book_id).await? {
            Some(pending) => {
                let fulfilled = tx
                    .set_reservation_status(pending.id, ReservationStatus::Fulfilled)
                    .await?;
                Ok(Some(fulfilled))
            }
            None => Ok(None),
        }
    }

    /// Pending queue for a book, oldest first (admin)
    pub async fn queue_for(&self, caller: &Caller, book_id: i32) -> AppResult<Vec<Reservation>> {
        caller.require_admin()?;
        self.repository.circulation.pending_reservations(book_id).await
    }

    /// One reservation, for its holder or an admin
    pub async fn get(&self, caller: &Caller, reservation_id: i32) -> AppResult<Reservation> {
        let reservation = self
            .repository
            .circulation
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", reservation_id)))?;
        caller.require_self_or_admin(reservation.user_id)?;
        Ok(reservation)
    }

    /// The caller's own reservations
    pub async fn list_mine(&self, caller: &Caller) -> AppResult<Vec<Reservation>> {
        self.repository
            .circulation
            .reservations_for_user(caller.user_id)
            .await
    }

    /// Cancel a pending reservation (owner or admin)
    pub async fn cancel(&self, caller: &Caller, reservation_id: i32) -> AppResult<Reservation> {
        let mut tx = self.repository.circulation.begin().await?;
        let reservation = tx
            .lock_reservation(reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", reservation_id)))?;
        caller.require_self_or_admin(reservation.user_id)?;

        match reservation.status {
            ReservationStatus::Pending => {
                let cancelled = tx
                    .set_reservation_status(reservation_id, ReservationStatus::Cancelled)
                    .await?;
                tx.commit().await?;
                tracing::info!(reservation_id, book_id = cancelled.book_id, "Reservation cancelled");
                Ok(cancelled)
            }
            ReservationStatus::Fulfilled | ReservationStatus::Cancelled => {
                Err(AppError::Conflict(format!(
                    "Reservation {} is {} and cannot be cancelled",
                    reservation_id, reservation.status
                )))
            }
        }
    }
}
