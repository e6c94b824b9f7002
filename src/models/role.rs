//! Caller roles, guarded operations and the role authorizer

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Fixed role set resolved by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Therapist,
    Technician,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Therapist,
        Role::Technician,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Therapist => "therapist",
            Role::Technician => "technician",
            Role::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "therapist" => Ok(Role::Therapist),
            "technician" => Ok(Role::Technician),
            "viewer" => Ok(Role::Viewer),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Operations gated by the authorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewEquipment,
    RegisterEquipment,
    AdjustQuantity,
    ChangeEquipmentStatus,
    DeleteEquipment,
    ViewRentals,
    CreateRental,
    ReturnRental,
    CancelRental,
    ViewCustomizations,
    CreateCustomization,
    TransitionCustomization,
    CancelCustomization,
    ViewSchedules,
    ManageSchedules,
    RefreshReminders,
}

impl Operation {
    fn is_read(&self) -> bool {
        matches!(
            self,
            Operation::ViewEquipment
                | Operation::ViewRentals
                | Operation::ViewCustomizations
                | Operation::ViewSchedules
        )
    }
}

/// Pure role check: no lookups, no ambient state.
pub fn can_perform(role: Role, operation: Operation) -> bool {
    use Operation::*;

    if operation.is_read() {
        return true;
    }

    match role {
        Role::Admin => true,
        Role::Manager => !matches!(operation, DeleteEquipment),
        Role::Therapist => matches!(
            operation,
            CreateRental
                | ReturnRental
                | CancelRental
                | CreateCustomization
                | TransitionCustomization
                | ManageSchedules
        ),
        Role::Technician => matches!(
            operation,
            ChangeEquipmentStatus | ReturnRental | TransitionCustomization | ManageSchedules
        ),
        Role::Viewer => false,
    }
}

/// Explicit caller context handed to every domain operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: i32,
    pub role: Role,
}

impl ActorContext {
    pub fn new(actor_id: i32, role: Role) -> Self {
        Self { actor_id, role }
    }

    pub fn require(&self, operation: Operation) -> Result<(), AppError> {
        if can_perform(self.role, operation) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' may not perform {:?}",
                self.role, operation
            )))
        }
    }
}

/// Claims of a bearer token issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl CallerClaims {
    /// Verify signature and expiry, then decode the claims
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> ActorContext {
        ActorContext::new(self.user_id, self.role)
    }
}
