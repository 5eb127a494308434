//! In-process store used for demos and tests.
//!
//! Every transaction holds the single state mutex from `begin` until it is
//! committed or dropped, and works on a private copy of the state that only
//! replaces the shared one on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{CatalogRepository, CirculationRepository, CirculationTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookPatch, BookQuery, Borrow, BorrowStatus, Fine, FineStatus, NewBook, NewBorrow,
        Reservation, ReservationStatus,
    },
};

#[derive(Debug, Clone, Default)]
struct State {
    books: BTreeMap<i32, Book>,
    borrows: BTreeMap<i32, Borrow>,
    fines: BTreeMap<i32, Fine>,
    reservations: BTreeMap<i32, Reservation>,
    last_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn pending_for_book(&self, book_id: i32) -> Vec<Reservation> {
        let mut pending: Vec<Reservation> = self
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.status == ReservationStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.reservation_date, r.id));
        pending
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.state.lock().await.books.get(&id).cloned())
    }

    async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .filter(|b| query.matches(b))
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect())
    }

    async fn create_book(&self, book: &NewBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        if state.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::Conflict(format!(
                "Book with ISBN {} already exists",
                book.isbn
            )));
        }
        let created = Book {
            id: state.next_id(),
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            publisher: book.publisher.clone(),
            category: book.category.clone(),
            edition: book.edition.clone(),
            year: book.year,
            total_copies: book.total_copies,
            available_copies: book.total_copies,
        };
        created.check_copies()?;
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_book(&self, id: i32, patch: &BookPatch) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        let mut book = state
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
        patch.apply_to(&mut book)?;
        state.books.insert(id, book.clone());
        Ok(book)
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&id) {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }
        if state.borrows.values().any(|b| b.book_id == id) {
            return Err(AppError::Conflict(format!(
                "Book {} has borrow history and cannot be deleted",
                id
            )));
        }
        state.reservations.retain(|_, r| r.book_id != id);
        state.books.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CirculationRepository for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn get_borrow(&self, id: i32) -> AppResult<Option<Borrow>> {
        Ok(self.state.lock().await.borrows.get(&id).cloned())
    }

    async fn borrows_for_user(&self, user_id: i32) -> AppResult<Vec<Borrow>> {
        let state = self.state.lock().await;
        Ok(state
            .borrows
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all_borrows(&self) -> AppResult<Vec<Borrow>> {
        Ok(self.state.lock().await.borrows.values().cloned().collect())
    }

    async fn fines_for_borrow(&self, borrow_id: i32) -> AppResult<Vec<Fine>> {
        let state = self.state.lock().await;
        Ok(state
            .fines
            .values()
            .filter(|f| f.borrow_id == borrow_id)
            .cloned()
            .collect())
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn reservations_for_user(&self, user_id: i32) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        let mut reservations: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| (r.reservation_date, r.id));
        Ok(reservations)
    }

    async fn pending_reservations(&self, book_id: i32) -> AppResult<Vec<Reservation>> {
        Ok(self.state.lock().await.pending_for_book(book_id))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl CirculationTx for MemoryTx {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn adjust_availability(&mut self, book_id: i32, delta: i32) -> AppResult<Book> {
        let book = self
            .working
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;
        let next = book.available_copies + delta;
        if next < 0 || next > book.total_copies {
            return Err(AppError::Conflict(format!(
                "Adjusting book {} availability by {} would leave {}/{} copies",
                book_id, delta, next, book.total_copies
            )));
        }
        book.available_copies = next;
        Ok(book.clone())
    }

    async fn find_active_borrow(&mut self, user_id: i32, book_id: i32) -> AppResult<Option<Borrow>> {
        Ok(self
            .working
            .borrows
            .values()
            .find(|b| b.user_id == user_id && b.book_id == book_id && b.status.is_active())
            .cloned())
    }

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> AppResult<Borrow> {
        let created = Borrow {
            id: self.working.next_id(),
            user_id: borrow.user_id,
            book_id: borrow.book_id,
            borrow_date: borrow.borrow_date,
            due_date: borrow.due_date,
            return_date: None,
            status: BorrowStatus::Borrowed,
            fine_amount: Decimal::ZERO,
            overdue: false,
        };
        self.working.borrows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn lock_borrow(&mut self, borrow_id: i32) -> AppResult<Option<Borrow>> {
        Ok(self.working.borrows.get(&borrow_id).cloned())
    }

    async fn mark_returned(
        &mut self,
        borrow_id: i32,
        return_date: DateTime<Utc>,
        fine_amount: Decimal,
    ) -> AppResult<Borrow> {
        let borrow = self
            .working
            .borrows
            .get_mut(&borrow_id)
            .ok_or_else(|| AppError::NotFound(format!("Borrow {} not found", borrow_id)))?;
        borrow.return_date = Some(return_date);
        borrow.status = BorrowStatus::Returned;
        borrow.fine_amount = fine_amount;
        Ok(borrow.clone())
    }

    async fn insert_fine(&mut self, borrow_id: i32, amount: Decimal) -> AppResult<Fine> {
        let fine = Fine {
            id: self.working.next_id(),
            borrow_id,
            amount,
            status: FineStatus::Unpaid,
            payment_date: None,
        };
        self.working.fines.insert(fine.id, fine.clone());
        Ok(fine)
    }

    async fn lock_fine(&mut self, fine_id: i32) -> AppResult<Option<Fine>> {
        Ok(self.working.fines.get(&fine_id).cloned())
    }

    async fn set_fine_status(
        &mut self,
        fine_id: i32,
        status: FineStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> AppResult<Fine> {
        let fine = self
            .working
            .fines
            .get_mut(&fine_id)
            .ok_or_else(|| AppError::NotFound(format!("Fine {} not found", fine_id)))?;
        fine.status = status;
        fine.payment_date = payment_date;
        Ok(fine.clone())
    }

    async fn insert_reservation(
        &mut self,
        user_id: i32,
        book_id: i32,
        reservation_date: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let reservation = Reservation {
            id: self.working.next_id(),
            user_id,
            book_id,
            reservation_date,
            status: ReservationStatus::Pending,
        };
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_pending_reservation(
        &mut self,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Reservation>> {
        Ok(self
            .working
            .pending_for_book(book_id)
            .into_iter()
            .find(|r| r.user_id == user_id))
    }

    async fn earliest_pending_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.working.pending_for_book(book_id).into_iter().next())
    }

    async fn lock_reservation(&mut self, reservation_id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.working.reservations.get(&reservation_id).cloned())
    }

    async fn set_reservation_status(
        &mut self,
        reservation_id: i32,
        status: ReservationStatus,
    ) -> AppResult<Reservation> {
        let reservation = self
            .working
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", reservation_id)))?;
        reservation.status = status;
        Ok(reservation.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
