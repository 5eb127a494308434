//! Data models for the circulation server

pub mod book;
pub mod borrow;
pub mod enums;
pub mod fine;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookPatch, BookQuery, NewBook};
pub use borrow::{Borrow, NewBorrow, ReturnOutcome};
pub use enums::{BorrowStatus, FineStatus, ReservationStatus, UserRole};
pub use fine::Fine;
pub use reservation::Reservation;
pub use user::{Caller, UserClaims};
