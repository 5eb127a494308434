//! Book (catalog) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub category: Option<String>,
    pub edition: Option<String>,
    pub year: Option<i32>,
    pub total_copies: i32,
    /// Copies not currently on loan, always within `0..=total_copies`
    pub available_copies: i32,
}

impl Book {
    /// Check the availability invariant
    pub fn check_copies(&self) -> AppResult<()> {
        if self.total_copies < 0 {
            return Err(AppError::Validation(format!(
                "Book {}: total_copies cannot be negative",
                self.id
            )));
        }
        if self.available_copies < 0 || self.available_copies > self.total_copies {
            return Err(AppError::Validation(format!(
                "Book {}: available copies {} outside 0..={}",
                self.id, self.available_copies, self.total_copies
            )));
        }
        Ok(())
    }

    /// Copies currently out on loan
    pub fn on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewBook {
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub publisher: Option<String>,
    pub category: Option<String>,
    pub edition: Option<String>,
    pub year: Option<i32>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: i32,
}

/// Partial update of a book. Only fields present in the patch are written.
///
/// `available_copies` is owned by the borrow ledger and cannot be patched;
/// changing `total_copies` moves it by the same delta.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BookPatch {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub category: Option<String>,
    pub edition: Option<String>,
    pub year: Option<i32>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: Option<i32>,
}

impl BookPatch {
    /// Apply the patch in place, rejecting changes that would remove copies
    /// that are currently on loan.
    pub fn apply_to(&self, book: &mut Book) -> AppResult<()> {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref publisher) = self.publisher {
            book.publisher = Some(publisher.clone());
        }
        if let Some(ref category) = self.category {
            book.category = Some(category.clone());
        }
        if let Some(ref edition) = self.edition {
            book.edition = Some(edition.clone());
        }
        if let Some(year) = self.year {
            book.year = Some(year);
        }
        if let Some(total) = self.total_copies {
            let delta = total - book.total_copies;
            if book.available_copies + delta < 0 {
                return Err(AppError::Validation(format!(
                    "Cannot reduce book {} to {} copies while {} are on loan",
                    book.id,
                    total,
                    book.on_loan()
                )));
            }
            book.total_copies = total;
            book.available_copies += delta;
        }
        book.check_copies()
    }
}

/// Book search query
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive match on title, author or ISBN
    pub search: Option<String>,
    /// Exact category
    pub category: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl BookQuery {
    pub fn offset(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }

    /// Whether `book` satisfies the search and category filters
    pub fn matches(&self, book: &Book) -> bool {
        let search_ok = match self.search.as_deref() {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                book.title.to_lowercase().contains(&term)
                    || book.author.to_lowercase().contains(&term)
                    || book.isbn.to_lowercase().contains(&term)
            }
        };
        let category_ok = match self.category.as_deref() {
            None => true,
            Some(category) => book.category.as_deref() == Some(category),
        };
        search_ok && category_ok
    }
}
