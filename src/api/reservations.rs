//! Reservation endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::reservation::Reservation};

use super::AuthenticatedUser;

/// Reservations of the authenticated user
#[utoipa::path(
    get,
    path = "/reservations/mine",
    tag = "reservations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User's reservations", body = Vec<Reservation>)
    )
)]
pub async fn my_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state.services.reservations.list_mine(&claims.caller()).await?;
    Ok(Json(reservations))
}

/// Get a reservation by ID
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 403, description = "Not the holder or an administrator"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .reservations
        .get(&claims.caller(), reservation_id)
        .await?;
    Ok(Json(reservation))
}

/// Pending reservations for a book, oldest first
#[utoipa::path(
    get,
    path = "/books/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Reservation queue", body = Vec<Reservation>),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn book_queue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Vec<Reservation>>> {
    let queue = state
        .services
        .reservations
        .queue_for(&claims.caller(), book_id)
        .await?;
    Ok(Json(queue))
}

/// Cancel a pending reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation is no longer pending")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(reservation_id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .reservations
        .cancel(&claims.caller(), reservation_id)
        .await?;
    Ok(Json(reservation))
}
