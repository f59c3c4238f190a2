//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{account, admin, books, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BookVault API",
        version = "1.0.0",
        description = "Library catalog and lending REST API",
        license(name = "Apache-2.0", url = "https://www.apache.org/licenses/LICENSE-2.0")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Account
        account::register,
        account::verify_otp,
        account::resend_otp,
        account::login,
        account::logout,
        account::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Lending
        books::update_copies,
        books::availability,
        books::borrow_book,
        books::reserve_book,
        books::return_book,
        books::due_date,
        // Admin
        admin::list_users,
        admin::update_user,
        admin::assess_fines,
        admin::clear_fine,
    ),
    components(
        schemas(
            // Account
            account::RegisterResponse,
            account::VerifyOtpRequest,
            account::ResendOtpRequest,
            account::LoginRequest,
            account::LoginResponse,
            account::MessageResponse,
            crate::models::user::Role,
            crate::models::user::RegisterUser,
            crate::models::user::UserResponse,
            crate::models::user::AdminUpdateUser,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::page::BookPage,
            crate::models::page::UserPage,
            // Ledger
            crate::models::loan::BorrowerRef,
            crate::models::loan::Loan,
            crate::models::loan::LedgerAction,
            crate::models::loan::HistoryEntry,
            books::CopiesRequest,
            books::LendingRequest,
            books::LendingResponse,
            books::AvailabilityResponse,
            books::DueDateResponse,
            // Admin
            admin::FineChargeResponse,
            admin::AssessFinesResponse,
            admin::ClearFineResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "account", description = "Registration and sessions"),
        (name = "books", description = "Catalog management"),
        (name = "lending", description = "Borrowing, reservations and returns"),
        (name = "admin", description = "Account and fine administration")
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
