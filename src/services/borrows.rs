//! Borrow ledger: issuing loans, taking returns and charging late fines

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use super::{
    clock::Clock, fines::compute_fine, fines::FineLedger, notifier::ReservationNotifier,
    reservations::ReservationQueue,
};
use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{Borrow, BorrowStatus, Caller, NewBorrow, ReturnOutcome},
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowLedger {
    repository: Repository,
    policy: CirculationConfig,
    clock: Clock,
    notifier: Arc<dyn ReservationNotifier>,
}

impl BorrowLedger {
    pub fn new(
        repository: Repository,
        policy: CirculationConfig,
        clock: Clock,
        notifier: Arc<dyn ReservationNotifier>,
    ) -> Self {
        Self {
            repository,
            policy,
            clock,
            notifier,
        }
    }

    /// Borrow a copy of a book for the caller.
    ///
    /// With no copy free, a pending reservation is committed and the call
    /// fails with [`AppError::Unavailable`]. Otherwise one copy is taken and a
    /// `borrowed` record due `loan_period_days` from now is created. A pending
    /// reservation the caller held for the book is fulfilled by the same
    /// transaction.
    pub async fn request_borrow(&self, caller: &Caller, book_id: i32) -> AppResult<Borrow> {
        let now = self.clock.now();
        let due_date = Duration::try_days(self.policy.loan_period_days)
            .and_then(|period| now.checked_add_signed(period))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Loan period of {} days is out of range",
                    self.policy.loan_period_days
                ))
            })?;
        let mut tx = self.repository.circulation.begin().await?;

        let book = tx
            .lock_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

        if book.available_copies <= 0 {
            let reservation =
                ReservationQueue::enqueue(tx.as_mut(), caller.user_id, book.id, now).await?;
            tx.commit().await?;
            tracing::warn!(
                user_id = caller.user_id,
                book_id,
                reservation_id = reservation.id,
                "Book unavailable, reservation placed"
            );
            return Err(AppError::Unavailable {
                book_id,
                reservation_id: reservation.id,
            });
        }

        if tx.find_active_borrow(caller.user_id, book.id).await?.is_some() {
            return Err(AppError::DuplicateActiveLoan {
                user_id: caller.user_id,
                book_id,
            });
        }

        tx.adjust_availability(book.id, -1).await?;
        let borrow = tx
            .insert_borrow(&NewBorrow {
                user_id: caller.user_id,
                book_id: book.id,
                borrow_date: now,
                due_date,
            })
            .await?;
        let fulfilled = ReservationQueue::fulfill_for(tx.as_mut(), caller.user_id, book.id).await?;
        tx.commit().await?;

        tracing::info!(
            borrow_id = borrow.id,
            user_id = caller.user_id,
            book_id,
            due_date = %borrow.due_date,
            fulfilled_reservation = ?fulfilled.map(|r| r.id),
            "Book borrowed"
        );
        Ok(borrow)
    }

    /// Take back a borrowed copy (admin).
    ///
    /// Charges `overdue_days * fine_rate_per_day` when late, frees the copy
    /// and reports the earliest pending reservation for the book, which is
    /// also passed to the notifier once the transaction has committed.
    pub async fn return_book(&self, caller: &Caller, borrow_id: i32) -> AppResult<ReturnOutcome> {
        caller.require_admin()?;

        let now = self.clock.now();
        let mut tx = self.repository.circulation.begin().await?;

        let borrow = tx
            .lock_borrow(borrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow {} not found", borrow_id)))?;

        match borrow.status {
            BorrowStatus::Borrowed | BorrowStatus::Overdue => {}
            BorrowStatus::Returned => return Err(AppError::AlreadyReturned(borrow_id)),
            BorrowStatus::Requested => {
                return Err(AppError::Conflict(format!(
                    "Borrow {} was never issued and cannot be returned",
                    borrow_id
                )))
            }
        }

        let fine_amount = compute_fine(borrow.due_date, now, self.policy.fine_rate_per_day);
        let fine = if fine_amount > Decimal::ZERO {
            Some(FineLedger::record(tx.as_mut(), borrow.id, fine_amount).await?)
        } else {
            None
        };

        let borrow = tx.mark_returned(borrow.id, now, fine_amount).await?;
        let book = tx.adjust_availability(borrow.book_id, 1).await?;
        let next_reservation = ReservationQueue::peek_earliest(tx.as_mut(), book.id).await?;
        tx.commit().await?;

        tracing::info!(
            borrow_id,
            book_id = book.id,
            fine = %borrow.fine_amount,
            admin_id = caller.user_id,
            "Book returned"
        );

        if let Some(ref reservation) = next_reservation {
            if let Err(e) = self.notifier.reservation_ready(reservation, &book).await {
                tracing::error!(
                    reservation_id = reservation.id,
                    "Failed to notify reservation holder: {}",
                    e
                );
            }
        }

        Ok(ReturnOutcome {
            borrow,
            fine,
            next_reservation,
        })
    }

    /// Every borrow of the caller, returned or not
    pub async fn list_history(&self, caller: &Caller) -> AppResult<Vec<Borrow>> {
        let borrows = self
            .repository
            .circulation
            .borrows_for_user(caller.user_id)
            .await?;
        Ok(self.flag_overdue(borrows))
    }

    /// Every borrow in the system (admin)
    pub async fn list_all(&self, caller: &Caller) -> AppResult<Vec<Borrow>> {
        caller.require_admin()?;
        let borrows = self.repository.circulation.all_borrows().await?;
        Ok(self.flag_overdue(borrows))
    }

    fn flag_overdue(&self, borrows: Vec<Borrow>) -> Vec<Borrow> {
        let now = self.clock.now();
        borrows.into_iter().map(|b| b.flagged_at(now)).collect()
    }

    /// One borrow, for its borrower or an admin
    pub async fn get(&self, caller: &Caller, borrow_id: i32) -> AppResult<Borrow> {
        let borrow = self
            .repository
            .circulation
            .get_borrow(borrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow {} not found", borrow_id)))?;
        caller.require_self_or_admin(borrow.user_id)?;
        Ok(borrow.flagged_at(self.clock.now()))
    }
}
