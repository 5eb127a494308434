//! Fine model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::FineStatus;

/// Monetary penalty for a late return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub borrow_id: i32,
    pub amount: Decimal,
    pub status: FineStatus,
    /// Set only on the transition to `paid`
    pub payment_date: Option<DateTime<Utc>>,
}
