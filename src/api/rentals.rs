//! Rental endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::rental::{CancelRental, CreateRental, Rental, ReturnRental},
    AppState,
};

use super::AuthenticatedUser;

/// Grant a rental
#[utoipa::path(
    post,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = CreateRental,
    responses(
        (status = 201, description = "Rental created, quantity reserved", body = Rental),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment retired or under maintenance", body = crate::error::ErrorResponse),
        (status = 422, description = "Not enough units available", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_rental(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Json(data): Json<CreateRental>,
) -> AppResult<(StatusCode, Json<Rental>)> {
    let rental = state.services.rentals.create(&ctx, data).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// Get a rental
#[utoipa::path(
    get,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental details", body = Rental),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn get_rental(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Rental>> {
    let rental = state.services.rentals.get(&ctx, id).await?;
    Ok(Json(rental))
}

/// Rentals of one equipment item
#[utoipa::path(
    get,
    path = "/equipment/{id}/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Rentals, newest first", body = Vec<Rental>),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn list_equipment_rentals(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Rental>>> {
    let rentals = state.services.rentals.list_for_equipment(&ctx, id).await?;
    Ok(Json(rentals))
}

/// Return a rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    request_body = ReturnRental,
    responses(
        (status = 200, description = "Rental returned, quantity released", body = Rental),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental already returned or cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_rental(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<ReturnRental>>,
) -> AppResult<Json<Rental>> {
    let data = body.map(|Json(data)| data).unwrap_or_default();
    let rental = state.services.rentals.return_rental(&ctx, id, data).await?;
    Ok(Json(rental))
}

/// Cancel a rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/cancel",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    request_body = CancelRental,
    responses(
        (status = 200, description = "Rental cancelled, quantity released", body = Rental),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental already returned or cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_rental(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<CancelRental>>,
) -> AppResult<Json<Rental>> {
    let data = body.map(|Json(data)| data).unwrap_or_default();
    let rental = state.services.rentals.cancel_rental(&ctx, id, data.notes).await?;
    Ok(Json(rental))
}
