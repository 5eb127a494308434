//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookPatch, BookQuery, Caller, NewBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.catalog.list_books(query).await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .catalog
            .get_book(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    pub async fn create_book(&self, caller: &Caller, book: &NewBook) -> AppResult<Book> {
        caller.require_admin()?;
        book.validate()?;
        let created = self.repository.catalog.create_book(book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book created");
        Ok(created)
    }

    pub async fn update_book(&self, caller: &Caller, id: i32, patch: &BookPatch) -> AppResult<Book> {
        caller.require_admin()?;
        patch.validate()?;
        self.repository.catalog.update_book(id, patch).await
    }

    pub async fn delete_book(&self, caller: &Caller, id: i32) -> AppResult<()> {
        caller.require_admin()?;
        self.repository.catalog.delete_book(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
