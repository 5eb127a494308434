//! Borrow (loan) model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::BorrowStatus;
use super::fine::Fine;
use super::reservation::Reservation;

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    /// Fine charged at return time, zero when returned on time
    pub fine_amount: Decimal,
    /// Still out past its due date when read. Not stored.
    #[sqlx(skip)]
    #[serde(default)]
    pub overdue: bool,
}

impl Borrow {
    /// Whether the copy is still out past its due date at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && now > self.due_date
    }

    /// Fill in the derived `overdue` flag as of `now`
    pub fn flagged_at(mut self, now: DateTime<Utc>) -> Self {
        self.overdue = self.is_overdue(now);
        self
    }
}

/// Data for inserting a freshly issued borrow
#[derive(Debug, Clone)]
pub struct NewBorrow {
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Borrow request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i32,
}

/// Result of returning a book
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    /// The borrow, now `returned`
    pub borrow: Borrow,
    /// Fine recorded for a late return
    pub fine: Option<Fine>,
    /// Earliest pending reservation for the book, still pending
    pub next_reservation: Option<Reservation>,
}
