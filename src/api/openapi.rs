//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{customizations, equipment, health, rentals, schedules};

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

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Caseworks API",
        version = "1.0.0",
        description = "Equipment, rental, fabrication and scheduling workflows for assistive-technology providers",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Caseworks Team", email = "dev@caseworks.local")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::register_equipment,
        equipment::adjust_quantity,
        equipment::change_status,
        equipment::delete_equipment,
        // Rentals
        rentals::create_rental,
        rentals::get_rental,
        rentals::list_equipment_rentals,
        rentals::return_rental,
        rentals::cancel_rental,
        // Customizations
        customizations::create_customization,
        customizations::get_customization,
        customizations::transition_stage,
        customizations::cancel_customization,
        customizations::get_history,
        // Schedules
        schedules::list_schedules,
        schedules::get_schedule,
        schedules::create_schedule,
        schedules::update_status,
        schedules::pending_reminders,
        schedules::refresh_reminders,
    ),
    components(
        schemas(
            // Equipment
            crate::models::equipment::EquipmentItem,
            crate::models::equipment::EquipmentStatus,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::AdjustQuantity,
            crate::models::equipment::ChangeStatus,
            // Rentals
            crate::models::rental::Rental,
            crate::models::rental::RentalStatus,
            crate::models::rental::CreateRental,
            crate::models::rental::ReturnRental,
            crate::models::rental::CancelRental,
            // Customizations
            crate::models::customization::CustomizationRequest,
            crate::models::customization::CustomizationStage,
            crate::models::customization::StageHistoryEntry,
            crate::models::customization::CreateCustomization,
            crate::models::customization::TransitionStage,
            crate::models::customization::TransitionOutcome,
            customizations::CancelCustomization,
            // Schedules
            crate::models::schedule::Schedule,
            crate::models::schedule::ScheduleType,
            crate::models::schedule::ScheduleStatus,
            crate::models::schedule::CreateSchedule,
            crate::models::schedule::UpdateScheduleStatus,
            crate::models::notification::ScheduleReminder,
            schedules::RefreshResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment inventory ledger"),
        (name = "rentals", description = "Rental lifecycle"),
        (name = "customizations", description = "Custom fabrication stages"),
        (name = "schedules", description = "Schedules and reminders")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
