//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrows, fines, health, reservations};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "0.1.0",
        description = "Library circulation: borrows, returns, reservations and fines"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Borrows
        borrows::request_borrow,
        borrows::return_book,
        borrows::my_history,
        borrows::all_borrows,
        borrows::get_borrow,
        // Fines
        fines::borrow_fines,
        fines::pay_fine,
        fines::waive_fine,
        // Reservations
        reservations::my_reservations,
        reservations::get_reservation,
        reservations::book_queue,
        reservations::cancel_reservation,
    ),
    components(
        schemas(
            crate::models::book::Book,
            crate::models::book::NewBook,
            crate::models::book::BookPatch,
            crate::models::book::BookQuery,
            crate::models::borrow::Borrow,
            crate::models::borrow::BorrowRequest,
            crate::models::borrow::ReturnOutcome,
            crate::models::fine::Fine,
            crate::models::reservation::Reservation,
            crate::models::enums::BorrowStatus,
            crate::models::enums::FineStatus,
            crate::models::enums::ReservationStatus,
            crate::models::enums::UserRole,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "borrows", description = "Borrow and return workflow"),
        (name = "fines", description = "Overdue fines"),
        (name = "reservations", description = "Reservation queue")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
