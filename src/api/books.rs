//! Book catalog and lending endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        page::{BookPage, PaginatedResponse},
    },
    services::lending::LendingReceipt,
};

use super::AuthenticatedUser;

/// Inventory adjustment; negative values withdraw copies
#[derive(Deserialize, ToSchema)]
pub struct CopiesRequest {
    pub delta: i32,
}

/// Optional target of a lending operation. Defaults to the caller;
/// acting for someone else requires librarian rights.
#[derive(Debug, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LendingRequest {
    pub borrower_id: Option<Uuid>,
}

impl LendingRequest {
    /// An empty body means "for myself"; anything else must be a valid request
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid lending request: {}", e)))
    }
}

/// Result of borrow, reserve, return and copies operations
#[derive(Serialize, ToSchema)]
pub struct LendingResponse {
    pub message: String,
    pub book_id: Uuid,
    pub copies_available: i32,
    pub total_copies: i32,
    /// Set when a copy was lent
    pub due_date: Option<DateTime<Utc>>,
    /// 1-based position when the borrower is queued
    pub queue_position: Option<usize>,
    /// Fine charged by this operation
    pub fine_charged: i64,
    /// Outstanding fine of the borrower on this book
    pub fine_total: i64,
}

impl LendingResponse {
    fn from_receipt(receipt: LendingReceipt, borrower_id: Option<Uuid>) -> Self {
        let fine_total = borrower_id.map(|id| receipt.book.fine_for(id)).unwrap_or(0);
        Self {
            message: receipt.message,
            book_id: receipt.book.id,
            copies_available: receipt.book.copies_available,
            total_copies: receipt.book.total_copies,
            due_date: receipt.due_date,
            queue_position: receipt.queue_position,
            fine_charged: receipt.fine_charged,
            fine_total,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub book_id: Uuid,
    pub available: bool,
    pub copies_available: i32,
    pub total_copies: i32,
    pub reservations: usize,
}

#[derive(Serialize, ToSchema)]
pub struct DueDateResponse {
    /// Due date of a loan starting now
    pub due_date: DateTime<Utc>,
    pub loan_period_days: i64,
}

/// List books with search and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Paginated books", body = BookPage),
        (status = 400, description = "Invalid page or limit")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookPage>> {
    let (books, total, page) = state.services.catalog.search_books(&query).await?;
    Ok(Json(PaginatedResponse::new(books, total, page)))
}

/// Get a book with its lending details
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(&id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian rights required"),
        (status = 409, description = "Title or ISBN already exists")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_staff()?;
    let created = state.services.catalog.add_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update book metadata
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Librarian rights required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Title or ISBN already exists")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require_staff()?;
    let book = state.services.catalog.update_book(&id, update).await?;
    Ok(Json(book))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Admin rights required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.catalog.delete_book(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add or withdraw copies
#[utoipa::path(
    post,
    path = "/books/{id}/copies",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    request_body = CopiesRequest,
    responses(
        (status = 200, description = "Copies updated", body = LendingResponse),
        (status = 403, description = "Librarian rights required"),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Would leave fewer copies than active loans")
    )
)]
pub async fn update_copies(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<CopiesRequest>,
) -> AppResult<Json<LendingResponse>> {
    claims.require_staff()?;
    let receipt = state.services.lending.update_copies(&id, request.delta).await?;
    Ok(Json(LendingResponse::from_receipt(receipt, None)))
}

/// Check whether a copy can be borrowed right now
#[utoipa::path(
    get,
    path = "/books/{id}/availability",
    tag = "lending",
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    responses(
        (status = 200, description = "Availability", body = AvailabilityResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn availability(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AvailabilityResponse>> {
    let book = state.services.lending.get_ledger(&id).await?;

    Ok(Json(AvailabilityResponse {
        book_id: book.id,
        available: book.is_available(),
        copies_available: book.copies_available,
        total_copies: book.total_copies,
        reservations: book.reservation_queue.len(),
    }))
}

/// Borrow a copy, or join the reservation queue when none is left
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    request_body(content = LendingRequest, description = "Optional borrower", content_type = "application/json"),
    responses(
        (status = 200, description = "Book borrowed or borrower queued", body = LendingResponse),
        (status = 400, description = "Malformed request body"),
        (status = 403, description = "Acting for another borrower requires librarian rights"),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "Borrower already holds a copy")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<LendingResponse>> {
    let request = LendingRequest::from_body(&body)?;
    let borrower_id = claims.resolve_borrower(request.borrower_id)?;

    let receipt = state.services.lending.borrow_book(&id, borrower_id).await?;
    Ok(Json(LendingResponse::from_receipt(receipt, Some(borrower_id))))
}

/// Reserve a book that has no copy left
#[utoipa::path(
    post,
    path = "/books/{id}/reserve",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    request_body(content = LendingRequest, description = "Optional borrower", content_type = "application/json"),
    responses(
        (status = 200, description = "Borrower queued, or book available", body = LendingResponse),
        (status = 400, description = "Malformed request body"),
        (status = 403, description = "Acting for another borrower requires librarian rights"),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "Already queued or holding a copy")
    )
)]
pub async fn reserve_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<LendingResponse>> {
    let request = LendingRequest::from_body(&body)?;
    let borrower_id = claims.resolve_borrower(request.borrower_id)?;

    let receipt = state.services.lending.reserve_book(&id, borrower_id).await?;
    Ok(Json(LendingResponse::from_receipt(receipt, Some(borrower_id))))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Book UUID or ISBN")),
    request_body(content = LendingRequest, description = "Optional borrower", content_type = "application/json"),
    responses(
        (status = 200, description = "Book returned", body = LendingResponse),
        (status = 400, description = "Malformed request body"),
        (status = 403, description = "Acting for another borrower requires librarian rights"),
        (status = 404, description = "Book or borrower not found"),
        (status = 422, description = "Borrower holds no copy of this book")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<LendingResponse>> {
    let request = LendingRequest::from_body(&body)?;
    let borrower_id = claims.resolve_borrower(request.borrower_id)?;

    let receipt = state.services.lending.return_book(&id, borrower_id).await?;
    Ok(Json(LendingResponse::from_receipt(receipt, Some(borrower_id))))
}

/// Due date a loan starting now would get
#[utoipa::path(
    get,
    path = "/books/due-date",
    tag = "lending",
    responses(
        (status = 200, description = "Due date", body = DueDateResponse)
    )
)]
pub async fn due_date(State(state): State<crate::AppState>) -> Json<DueDateResponse> {
    let lending = &state.services.lending;
    Json(DueDateResponse {
        due_date: lending.calculate_due_date(),
        loan_period_days: lending.policy().loan_period.num_days(),
    })
}
