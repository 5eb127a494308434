//! Fine endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::fine::Fine};

use super::AuthenticatedUser;

/// Fines charged on a borrow
#[utoipa::path(
    get,
    path = "/borrows/{id}/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow ID")),
    responses(
        (status = 200, description = "Fines for the borrow", body = Vec<Fine>),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn borrow_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
) -> AppResult<Json<Vec<Fine>>> {
    let fines = state
        .services
        .fines
        .for_borrow(&claims.caller(), borrow_id)
        .await?;
    Ok(Json(fines))
}

/// Record payment of a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Fine ID")),
    responses(
        (status = 200, description = "Fine paid (or already paid)", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine was waived")
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(fine_id): Path<i32>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.pay(&claims.caller(), fine_id).await?;
    Ok(Json(fine))
}

/// Waive an unpaid fine
#[utoipa::path(
    post,
    path = "/fines/{id}/waive",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Fine ID")),
    responses(
        (status = 200, description = "Fine waived (or already waived)", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid")
    )
)]
pub async fn waive_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(fine_id): Path<i32>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.waive(&claims.caller(), fine_id).await?;
    Ok(Json(fine))
}
