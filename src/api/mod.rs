//! API handlers for Caseworks REST endpoints

pub mod customizations;
pub mod equipment;
pub mod health;
pub mod openapi;
pub mod rentals;
pub mod schedules;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::role::{ActorContext, CallerClaims},
    AppState,
};

/// Extractor for the caller, verified from the bearer token
pub struct AuthenticatedUser(pub ActorContext);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = CallerClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims.actor()))
    }
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Equipment
        .route("/equipment", get(equipment::list_equipment).post(equipment::register_equipment))
        .route("/equipment/:id", get(equipment::get_equipment).delete(equipment::delete_equipment))
        .route("/equipment/:id/quantity", put(equipment::adjust_quantity))
        .route("/equipment/:id/status", put(equipment::change_status))
        .route("/equipment/:id/rentals", get(rentals::list_equipment_rentals))
        // Rentals
        .route("/rentals", post(rentals::create_rental))
        .route("/rentals/:id", get(rentals::get_rental))
        .route("/rentals/:id/return", post(rentals::return_rental))
        .route("/rentals/:id/cancel", post(rentals::cancel_rental))
        // Customizations
        .route("/customizations", post(customizations::create_customization))
        .route(
            "/customizations/:id",
            get(customizations::get_customization).delete(customizations::cancel_customization),
        )
        .route("/customizations/:id/stage", post(customizations::transition_stage))
        .route("/customizations/:id/history", get(customizations::get_history))
        // Schedules and reminders
        .route("/schedules", get(schedules::list_schedules).post(schedules::create_schedule))
        .route("/schedules/reminders", get(schedules::pending_reminders))
        .route("/schedules/reminders/refresh", post(schedules::refresh_reminders))
        .route("/schedules/:id", get(schedules::get_schedule))
        .route("/schedules/:id/status", put(schedules::update_status))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
