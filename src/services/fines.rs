//! Fine ledger: overdue fine arithmetic and payment/waiver transitions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{Caller, Fine, FineStatus},
    repository::{CirculationTx, Repository},
};

/// Whole days between `due_date` and `return_date`, never negative.
/// Partial days do not count.
pub fn overdue_days(due_date: DateTime<Utc>, return_date: DateTime<Utc>) -> i64 {
    (return_date - due_date).num_days().max(0)
}

/// Fine owed for a return: `overdue_days * rate`, zero when on time
pub fn compute_fine(due_date: DateTime<Utc>, return_date: DateTime<Utc>, rate_per_day: Decimal) -> Decimal {
    Decimal::from(overdue_days(due_date, return_date)) * rate_per_day
}

#[derive(Clone)]
pub struct FineLedger {
    repository: Repository,
    clock: Clock,
}

impl FineLedger {
    pub fn new(repository: Repository, clock: Clock) -> Self {
        Self { repository, clock }
    }

    /// Record an unpaid fine for a borrow inside the caller's transaction
    pub async fn record(tx: &mut dyn CirculationTx, borrow_id: i32, amount: Decimal) -> AppResult<Fine> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Fine amount must be positive (got {})",
                amount
            )));
        }
        tx.insert_fine(borrow_id, amount).await
    }

    /// Mark a fine as paid. Paying an already paid fine returns it unchanged.
    pub async fn pay(&self, caller: &Caller, fine_id: i32) -> AppResult<Fine> {
        caller.require_admin()?;

        let mut tx = self.repository.circulation.begin().await?;
        let fine = tx
            .lock_fine(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine {} not found", fine_id)))?;

        match fine.status {
            FineStatus::Paid => Ok(fine),
            FineStatus::Waived => Err(AppError::Conflict(format!(
                "Fine {} was waived and cannot be paid",
                fine_id
            ))),
            FineStatus::Unpaid => {
                let paid = tx
                    .set_fine_status(fine_id, FineStatus::Paid, Some(self.clock.now()))
                    .await?;
                tx.commit().await?;
                tracing::info!(fine_id, amount = %paid.amount, admin_id = caller.user_id, "Fine paid");
                Ok(paid)
            }
        }
    }

    /// Waive an unpaid fine. Waiving an already waived fine returns it unchanged.
    pub async fn waive(&self, caller: &Caller, fine_id: i32) -> AppResult<Fine> {
        caller.require_admin()?;

        let mut tx = self.repository.circulation.begin().await?;
        let fine = tx
            .lock_fine(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine {} not found", fine_id)))?;

        match fine.status {
            FineStatus::Waived => Ok(fine),
            FineStatus::Paid => Err(AppError::Conflict(format!(
                "Fine {} is already paid and cannot be waived",
                fine_id
            ))),
            FineStatus::Unpaid => {
                let waived = tx.set_fine_status(fine_id, FineStatus::Waived, None).await?;
                tx.commit().await?;
                tracing::info!(fine_id, amount = %waived.amount, admin_id = caller.user_id, "Fine waived");
                Ok(waived)
            }
        }
    }

    /// Fines attached to a borrow, for its borrower or an admin
    pub async fn for_borrow(&self, caller: &Caller, borrow_id: i32) -> AppResult<Vec<Fine>> {
        let borrow = self
            .repository
            .circulation
            .get_borrow(borrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow {} not found", borrow_id)))?;
        caller.require_self_or_admin(borrow.user_id)?;
        self.repository.circulation.fines_for_borrow(borrow_id).await
    }
}
