//! Repository layer for database operations
//!
//! Services only see the traits below. `postgres` backs them with sqlx,
//! `memory` with an in-process store.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        Book, BookPatch, BookQuery, Borrow, Fine, FineStatus, NewBook, NewBorrow, Reservation,
        ReservationStatus,
    },
};

/// Book catalog access
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>>;
    async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    async fn create_book(&self, book: &NewBook) -> AppResult<Book>;
    /// Apply a patch under a row lock, keeping the copy counts consistent
    async fn update_book(&self, id: i32, patch: &BookPatch) -> AppResult<Book>;
    async fn delete_book(&self, id: i32) -> AppResult<()>;
}

/// Borrow, reservation and fine storage
#[async_trait]
pub trait CirculationRepository: Send + Sync {
    /// Open a transaction. Dropping it without `commit` discards its writes.
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>>;

    async fn get_borrow(&self, id: i32) -> AppResult<Option<Borrow>>;
    async fn borrows_for_user(&self, user_id: i32) -> AppResult<Vec<Borrow>>;
    async fn all_borrows(&self) -> AppResult<Vec<Borrow>>;

    async fn fines_for_borrow(&self, borrow_id: i32) -> AppResult<Vec<Fine>>;

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>>;
    async fn reservations_for_user(&self, user_id: i32) -> AppResult<Vec<Reservation>>;
    /// Pending reservations for a book in queue order
    async fn pending_reservations(&self, book_id: i32) -> AppResult<Vec<Reservation>>;
}

/// Unit of work for one circulation operation.
///
/// `lock_*` reads take a row lock held until commit or drop, so two
/// transactions touching the same book or borrow run one after the other.
#[async_trait]
pub trait CirculationTx: Send {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<Book>>;
    /// Move `available_copies` by `delta`; fails if the result leaves `0..=total_copies`
    async fn adjust_availability(&mut self, book_id: i32, delta: i32) -> AppResult<Book>;

    async fn find_active_borrow(&mut self, user_id: i32, book_id: i32) -> AppResult<Option<Borrow>>;
    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> AppResult<Borrow>;
    async fn lock_borrow(&mut self, borrow_id: i32) -> AppResult<Option<Borrow>>;
    async fn mark_returned(
        &mut self,
        borrow_id: i32,
        return_date: DateTime<Utc>,
        fine_amount: Decimal,
    ) -> AppResult<Borrow>;

    async fn insert_fine(&mut self, borrow_id: i32, amount: Decimal) -> AppResult<Fine>;
    async fn lock_fine(&mut self, fine_id: i32) -> AppResult<Option<Fine>>;
    async fn set_fine_status(
        &mut self,
        fine_id: i32,
        status: FineStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> AppResult<Fine>;

    async fn insert_reservation(
        &mut self,
        user_id: i32,
        book_id: i32,
        reservation_date: DateTime<Utc>,
    ) -> AppResult<Reservation>;
    async fn find_pending_reservation(
        &mut self,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Reservation>>;
    async fn earliest_pending_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>>;
    async fn lock_reservation(&mut self, reservation_id: i32) -> AppResult<Option<Reservation>>;
    async fn set_reservation_status(
        &mut self,
        reservation_id: i32,
        status: ReservationStatus,
    ) -> AppResult<Reservation>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Main repository struct holding the storage backends
#[derive(Clone)]
pub struct Repository {
    pub catalog: Arc<dyn CatalogRepository>,
    pub circulation: Arc<dyn CirculationRepository>,
}

impl Repository {
    /// Create a repository backed by PostgreSQL
    pub fn new(pool: Pool<Postgres>) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            catalog: store.clone(),
            circulation: store,
        }
    }

    /// Create a repository backed by the in-process store
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            catalog: store.clone(),
            circulation: store,
        }
    }
}
