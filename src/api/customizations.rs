//! Customization request endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::customization::{
        CreateCustomization, CustomizationRequest, StageHistoryEntry, TransitionOutcome,
        TransitionStage,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Cancel request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelCustomization {
    /// Reason, stored as the history note
    pub notes: Option<String>,
}

/// Intake a customization request
#[utoipa::path(
    post,
    path = "/customizations",
    tag = "customizations",
    security(("bearer_auth" = [])),
    request_body = CreateCustomization,
    responses(
        (status = 201, description = "Request created at 'requested'", body = CustomizationRequest),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_customization(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Json(data): Json<CreateCustomization>,
) -> AppResult<(StatusCode, Json<CustomizationRequest>)> {
    let request = state.services.customizations.create(&ctx, data).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Get a customization request
#[utoipa::path(
    get,
    path = "/customizations/{id}",
    tag = "customizations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Customization request ID")),
    responses(
        (status = 200, description = "Request details", body = CustomizationRequest),
        (status = 404, description = "Request not found")
    )
)]
pub async fn get_customization(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CustomizationRequest>> {
    let request = state.services.customizations.get(&ctx, id).await?;
    Ok(Json(request))
}

/// Move a request to its next stage
#[utoipa::path(
    post,
    path = "/customizations/{id}/stage",
    tag = "customizations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Customization request ID")),
    request_body = TransitionStage,
    responses(
        (status = 200, description = "Stage changed", body = TransitionOutcome),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Illegal or terminal transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn transition_stage(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<TransitionStage>,
) -> AppResult<Json<TransitionOutcome>> {
    let outcome = state.services.customizations.transition_stage(&ctx, id, data).await?;
    Ok(Json(outcome))
}

/// Cancel a request (history is kept)
#[utoipa::path(
    delete,
    path = "/customizations/{id}",
    tag = "customizations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Customization request ID")),
    request_body = CancelCustomization,
    responses(
        (status = 200, description = "Request cancelled", body = TransitionOutcome),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already completed or cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_customization(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<CancelCustomization>>,
) -> AppResult<Json<TransitionOutcome>> {
    let data = body.map(|Json(data)| data).unwrap_or_default();
    let outcome = state.services.customizations.cancel(&ctx, id, data.notes).await?;
    Ok(Json(outcome))
}

/// Stage history of a request
#[utoipa::path(
    get,
    path = "/customizations/{id}/history",
    tag = "customizations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Customization request ID")),
    responses(
        (status = 200, description = "History, oldest first", body = Vec<StageHistoryEntry>),
        (status = 404, description = "Request not found")
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<StageHistoryEntry>>> {
    let history = state.services.customizations.history(&ctx, id).await?;
    Ok(Json(history))
}
