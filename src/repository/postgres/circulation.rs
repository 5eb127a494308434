//! Borrow, reservation and fine queries on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use super::PgStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        Book, Borrow, BorrowStatus, Fine, FineStatus, NewBorrow, Reservation, ReservationStatus,
    },
    repository::{CirculationRepository, CirculationTx},
};

#[async_trait]
impl CirculationRepository for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCirculationTx { tx }))
    }

    async fn get_borrow(&self, id: i32) -> AppResult<Option<Borrow>> {
        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(borrow)
    }

    async fn borrows_for_user(&self, user_id: i32) -> AppResult<Vec<Borrow>> {
        let borrows =
            sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE user_id = $1 ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(borrows)
    }

    async fn all_borrows(&self) -> AppResult<Vec<Borrow>> {
        let borrows = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(borrows)
    }

    async fn fines_for_borrow(&self, borrow_id: i32) -> AppResult<Vec<Fine>> {
        let fines =
            sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE borrow_id = $1 ORDER BY id")
                .bind(borrow_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(fines)
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>> {
        let reservation =
            sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(reservation)
    }

    async fn reservations_for_user(&self, user_id: i32) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE user_id = $1 ORDER BY reservation_date, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn pending_reservations(&self, book_id: i32) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE book_id = $1 AND status = $2
            ORDER BY reservation_date, id
            "#,
        )
        .bind(book_id)
        .bind(ReservationStatus::Pending)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }
}

/// Transaction over a pooled connection; rolled back by sqlx when dropped
pub struct PgCirculationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CirculationTx for PgCirculationTx {
    async fn lock_book(&mut self, book_id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn adjust_availability(&mut self, book_id: i32, delta: i32) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + $2
            WHERE id = $1 AND available_copies + $2 BETWEEN 0 AND total_copies
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(book) = updated {
            return Ok(book);
        }

        match self.lock_book(book_id).await? {
            Some(book) => Err(AppError::Conflict(format!(
                "Adjusting book {} availability by {} would leave {}/{} copies",
                book_id,
                delta,
                book.available_copies + delta,
                book.total_copies
            ))),
            None => Err(AppError::NotFound(format!("Book {} not found", book_id))),
        }
    }

    async fn find_active_borrow(&mut self, user_id: i32, book_id: i32) -> AppResult<Option<Borrow>> {
        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            SELECT * FROM borrows
            WHERE user_id = $1 AND book_id = $2 AND status IN ($3, $4)
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(BorrowStatus::Borrowed)
        .bind(BorrowStatus::Overdue)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(borrow)
    }

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, due_date, status, fine_amount)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING *
            "#,
        )
        .bind(borrow.user_id)
        .bind(borrow.book_id)
        .bind(borrow.borrow_date)
        .bind(borrow.due_date)
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match e {
            // borrows_one_active_per_user_book
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DuplicateActiveLoan {
                    user_id: borrow.user_id,
                    book_id: borrow.book_id,
                }
            }
            e => AppError::Database(e),
        })
    }

    async fn lock_borrow(&mut self, borrow_id: i32) -> AppResult<Option<Borrow>> {
        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(borrow_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(borrow)
    }

    async fn mark_returned(
        &mut self,
        borrow_id: i32,
        return_date: DateTime<Utc>,
        fine_amount: Decimal,
    ) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET return_date = $2, status = $3, fine_amount = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(borrow_id)
        .bind(return_date)
        .bind(BorrowStatus::Returned)
        .bind(fine_amount)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow {} not found", borrow_id)))
    }

    async fn insert_fine(&mut self, borrow_id: i32, amount: Decimal) -> AppResult<Fine> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (borrow_id, amount, status)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(borrow_id)
        .bind(amount)
        .bind(FineStatus::Unpaid)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(fine)
    }

    async fn lock_fine(&mut self, fine_id: i32) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1 FOR UPDATE")
            .bind(fine_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(fine)
    }

    async fn set_fine_status(
        &mut self,
        fine_id: i32,
        status: FineStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>(
            "UPDATE fines SET status = $2, payment_date = $3 WHERE id = $1 RETURNING *",
        )
        .bind(fine_id)
        .bind(status)
        .bind(payment_date)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Fine {} not found", fine_id)))
    }

    async fn insert_reservation(
        &mut self,
        user_id: i32,
        book_id: i32,
        reservation_date: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (user_id, book_id, reservation_date, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(reservation_date)
        .bind(ReservationStatus::Pending)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn find_pending_reservation(
        &mut self,
        user_id: i32,
        book_id: i32,
    ) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1 AND book_id = $2 AND status = $3
            ORDER BY reservation_date, id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(ReservationStatus::Pending)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn earliest_pending_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE book_id = $1 AND status = $2
            ORDER BY reservation_date, id
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .bind(ReservationStatus::Pending)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn lock_reservation(&mut self, reservation_id: i32) -> AppResult<Option<Reservation>> {
        let reservation =
            sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
                .bind(reservation_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(reservation)
    }

    async fn set_reservation_status(
        &mut self,
        reservation_id: i32,
        status: ReservationStatus,
    ) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>(
            "UPDATE reservations SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(reservation_id)
        .bind(status)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", reservation_id)))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
