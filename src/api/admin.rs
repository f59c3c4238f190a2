//! Administration endpoints: accounts and fines

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        loan::BorrowerRef,
        page::{PageRequest, PaginatedResponse, UserPage},
        user::{AdminUpdateUser, UserResponse},
    },
    services::lending::FineCharge,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct FineChargeResponse {
    pub book_id: Uuid,
    pub borrower: BorrowerRef,
    pub amount: i64,
}

impl From<FineCharge> for FineChargeResponse {
    fn from(charge: FineCharge) -> Self {
        Self {
            book_id: charge.book_id,
            borrower: charge.borrower,
            amount: charge.amount,
        }
    }
}

/// Result of an overdue sweep
#[derive(Serialize, ToSchema)]
pub struct AssessFinesResponse {
    pub charges: Vec<FineChargeResponse>,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ClearFineResponse {
    pub book_id: String,
    pub borrower_id: Uuid,
    /// Amount removed from the ledger
    pub cleared: i64,
}

/// List accounts
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Paginated users", body = UserPage),
        (status = 403, description = "Admin rights required")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<UserPage>> {
    claims.require_admin()?;

    let page = PageRequest::new(query.page, query.limit)?;
    let (users, total) = state.services.users.list_users(page).await?;
    let users = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(PaginatedResponse::new(users, total, page)))
}

/// Change role or active flag of an account
#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AdminUpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Admin rights required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(update): Json<AdminUpdateUser>,
) -> AppResult<Json<UserResponse>> {
    claims.require_admin()?;
    let user = state.services.users.update_user(id, update).await?;
    Ok(Json(user.into()))
}

/// Charge fines on every overdue loan
#[utoipa::path(
    post,
    path = "/admin/fines/assess",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fines charged", body = AssessFinesResponse),
        (status = 403, description = "Librarian rights required")
    )
)]
pub async fn assess_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AssessFinesResponse>> {
    claims.require_staff()?;

    let charges = state.services.lending.assess_overdue_fines().await?;
    let total = charges.iter().map(|c| c.amount).sum();
    tracing::info!(charges = charges.len(), total, "Overdue sweep done");

    Ok(Json(AssessFinesResponse {
        charges: charges.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// Clear the fine of a borrower on a book
#[utoipa::path(
    delete,
    path = "/admin/books/{id}/fines/{borrower_id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book UUID or ISBN"),
        ("borrower_id" = Uuid, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Fine cleared", body = ClearFineResponse),
        (status = 403, description = "Admin rights required"),
        (status = 404, description = "Book not found or no fine recorded")
    )
)]
pub async fn clear_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, borrower_id)): Path<(String, Uuid)>,
) -> AppResult<(StatusCode, Json<ClearFineResponse>)> {
    claims.require_admin()?;
    let cleared = state.services.lending.clear_fine(&id, borrower_id).await?;

    Ok((
        StatusCode::OK,
        Json(ClearFineResponse {
            book_id: id,
            borrower_id,
            cleared,
        }),
    ))
}
