//! Hook fired when a returned copy has a member waiting for it

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Book, Reservation},
};

/// Told about the earliest pending reservation after a return commits.
/// The reservation stays pending; the member still has to request the borrow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationNotifier: Send + Sync {
    async fn reservation_ready(&self, reservation: &Reservation, book: &Book) -> AppResult<()>;
}

/// Default notifier: writes the event to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl ReservationNotifier for LogNotifier {
    async fn reservation_ready(&self, reservation: &Reservation, book: &Book) -> AppResult<()> {
        tracing::info!(
            reservation_id = reservation.id,
            user_id = reservation.user_id,
            book_id = book.id,
            "Copy of \"{}\" available for reservation {}",
            book.title,
            reservation.id
        );
        Ok(())
    }
}
