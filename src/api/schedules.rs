//! Schedule and reminder endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        notification::ScheduleReminder,
        role::Operation,
        schedule::{CreateSchedule, Schedule, ScheduleQuery, UpdateScheduleStatus},
    },
    AppState,
};

use super::AuthenticatedUser;

/// Reminder refresh result
#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    /// Timers armed by the refresh
    pub armed: usize,
}

/// Ask the reminder daemon to pick up a schedule change
fn nudge_reminders(state: &AppState) {
    if let Some(reminders) = &state.reminders {
        reminders.request_refresh();
    }
}

/// List upcoming schedules
#[utoipa::path(
    get,
    path = "/schedules",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Schedules by start time", body = Vec<Schedule>)
    )
)]
pub async fn list_schedules(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<Vec<Schedule>>> {
    let schedules = state.services.schedules.list(&ctx, query.from, query.until).await?;
    Ok(Json(schedules))
}

/// Get a schedule
#[utoipa::path(
    get,
    path = "/schedules/{id}",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule details", body = Schedule),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Schedule>> {
    let schedule = state.services.schedules.get(&ctx, id).await?;
    Ok(Json(schedule))
}

/// Create a schedule
#[utoipa::path(
    post,
    path = "/schedules",
    tag = "schedules",
    security(("bearer_auth" = [])),
    request_body = CreateSchedule,
    responses(
        (status = 201, description = "Schedule created", body = Schedule),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_schedule(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Json(data): Json<CreateSchedule>,
) -> AppResult<(StatusCode, Json<Schedule>)> {
    let schedule = state.services.schedules.create(&ctx, data).await?;
    nudge_reminders(&state);
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// Close a schedule as completed, cancelled or no-show
#[utoipa::path(
    put,
    path = "/schedules/{id}/status",
    tag = "schedules",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    request_body = UpdateScheduleStatus,
    responses(
        (status = 200, description = "Status changed", body = Schedule),
        (status = 404, description = "Schedule not found"),
        (status = 409, description = "Schedule already closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateScheduleStatus>,
) -> AppResult<Json<Schedule>> {
    let schedule = state.services.schedules.update_status(&ctx, id, data.status).await?;
    nudge_reminders(&state);
    Ok(Json(schedule))
}

/// Reminders waiting to fire in this process
#[utoipa::path(
    get,
    path = "/schedules/reminders",
    tag = "schedules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending reminders, soonest first", body = Vec<ScheduleReminder>)
    )
)]
pub async fn pending_reminders(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> AppResult<Json<Vec<ScheduleReminder>>> {
    ctx.require(Operation::ViewSchedules)?;

    let pending = match &state.reminders {
        Some(reminders) => reminders.pending().await,
        None => Vec::new(),
    };
    Ok(Json(pending))
}

/// Rebuild the reminder timers from the schedule store now
#[utoipa::path(
    post,
    path = "/schedules/reminders/refresh",
    tag = "schedules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Timers rebuilt", body = RefreshResponse),
        (status = 409, description = "Reminder service is disabled")
    )
)]
pub async fn refresh_reminders(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> AppResult<Json<RefreshResponse>> {
    ctx.require(Operation::RefreshReminders)?;

    let reminders = state
        .reminders
        .as_ref()
        .ok_or_else(|| AppError::Conflict("Reminder service is disabled".to_string()))?;
    let armed = reminders.refresh().await?;
    Ok(Json(RefreshResponse { armed }))
}
