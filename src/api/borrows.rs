//! Borrow endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrow::{Borrow, BorrowRequest, ReturnOutcome},
};

use super::AuthenticatedUser;

/// Borrow a book for the authenticated user
#[utoipa::path(
    post,
    path = "/borrows/request",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = Borrow),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book unavailable (reservation placed) or already on loan to the user", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Borrow>)> {
    let borrow = state
        .services
        .borrows
        .request_borrow(&claims.caller(), request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Book returned", body = ReturnOutcome),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
) -> AppResult<Json<ReturnOutcome>> {
    let outcome = state
        .services
        .borrows
        .return_book(&claims.caller(), borrow_id)
        .await?;
    Ok(Json(outcome))
}

/// Borrow history of the authenticated user
#[utoipa::path(
    get,
    path = "/borrows/my-history",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User's borrows", body = Vec<Borrow>)
    )
)]
pub async fn my_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Borrow>>> {
    let borrows = state.services.borrows.list_history(&claims.caller()).await?;
    Ok(Json(borrows))
}

/// All borrows
#[utoipa::path(
    get,
    path = "/borrows/all",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Every borrow", body = Vec<Borrow>),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn all_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Borrow>>> {
    let borrows = state.services.borrows.list_all(&claims.caller()).await?;
    Ok(Json(borrows))
}

/// Get a borrow by ID
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Borrow", body = Borrow),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
) -> AppResult<Json<Borrow>> {
    let borrow = state.services.borrows.get(&claims.caller(), borrow_id).await?;
    Ok(Json(borrow))
}
