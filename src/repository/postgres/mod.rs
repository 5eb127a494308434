//! PostgreSQL-backed repositories

mod circulation;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::CatalogRepository;
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookPatch, BookQuery, NewBook},
};

pub use circulation::PgCirculationTx;

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    /// Get book by ID
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    /// Search books
    async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
            ORDER BY id
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(pattern)
        .bind(&query.category)
        .bind(query.offset())
        .bind(query.limit())
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Create a book with all its copies available
    async fn create_book(&self, book: &NewBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (isbn, title, author, publisher, category, edition, year,
                               total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.category)
        .bind(&book.edition)
        .bind(book.year)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Book with ISBN {} already exists", book.isbn))
            }
            e => AppError::Database(e),
        })
    }

    /// Update a book from a patch
    async fn update_book(&self, id: i32, patch: &BookPatch) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

        patch.apply_to(&mut book)?;

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, author = $3, publisher = $4, category = $5, edition = $6,
                year = $7, total_copies = $8, available_copies = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.category)
        .bind(&book.edition)
        .bind(book.year)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a book that has never been lent
    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

        let has_borrows: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM borrows WHERE book_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if has_borrows {
            return Err(AppError::Conflict(format!(
                "Book {} has borrow history and cannot be deleted",
                id
            )));
        }

        sqlx::query("DELETE FROM reservations WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
