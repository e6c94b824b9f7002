//! Equipment inventory endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::equipment::{AdjustQuantity, ChangeStatus, CreateEquipment, EquipmentItem},
    AppState,
};

use super::AuthenticatedUser;

/// List equipment
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All equipment, by name", body = Vec<EquipmentItem>)
    )
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> AppResult<Json<Vec<EquipmentItem>>> {
    let items = state.services.inventory.list(&ctx).await?;
    Ok(Json(items))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentItem),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentItem>> {
    let item = state.services.inventory.get(&ctx, id).await?;
    Ok(Json(item))
}

/// Register equipment
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment registered", body = EquipmentItem),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Role may not register equipment")
    )
)]
pub async fn register_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Json(data): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<EquipmentItem>)> {
    let item = state.services.inventory.register(&ctx, data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Adjust total and available quantities
#[utoipa::path(
    put,
    path = "/equipment/{id}/quantity",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = AdjustQuantity,
    responses(
        (status = 200, description = "Quantities updated", body = EquipmentItem),
        (status = 404, description = "Equipment not found"),
        (status = 422, description = "Quantities would break rental commitments", body = crate::error::ErrorResponse)
    )
)]
pub async fn adjust_quantity(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<AdjustQuantity>,
) -> AppResult<Json<EquipmentItem>> {
    let item = state
        .services
        .inventory
        .adjust_quantity(&ctx, id, data.total_quantity, data.available_quantity)
        .await?;
    Ok(Json(item))
}

/// Change equipment status
#[utoipa::path(
    put,
    path = "/equipment/{id}/status",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = ChangeStatus,
    responses(
        (status = 200, description = "Status changed", body = EquipmentItem),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Retired equipment cannot change status", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_status(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ChangeStatus>,
) -> AppResult<Json<EquipmentItem>> {
    let item = state.services.inventory.change_status(&ctx, id, data.status).await?;
    Ok(Json(item))
}

/// Delete equipment
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment has active rentals", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.inventory.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
