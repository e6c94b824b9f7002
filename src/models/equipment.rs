//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::parse_column;
use crate::error::{AppError, AppResult};

/// Equipment status. `retired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Normal,
    Maintenance,
    Retired,
}

text_enum!(EquipmentStatus {
    Normal => "normal",
    Maintenance => "maintenance",
    Retired => "retired",
});

impl EquipmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EquipmentStatus::Retired)
    }

    /// Statuses reachable from this one (including staying put)
    pub fn allowed_next(&self) -> &'static [EquipmentStatus] {
        match self {
            EquipmentStatus::Normal | EquipmentStatus::Maintenance => &[
                EquipmentStatus::Normal,
                EquipmentStatus::Maintenance,
                EquipmentStatus::Retired,
            ],
            EquipmentStatus::Retired => &[EquipmentStatus::Retired],
        }
    }

    pub fn can_transition_to(&self, target: EquipmentStatus) -> bool {
        self.allowed_next().contains(&target)
    }
}

/// Equipment item as exposed by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EquipmentItem {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub status: EquipmentStatus,
    /// Units owned
    pub total_quantity: i32,
    /// Units not committed to an active rental
    pub available_quantity: i32,
    pub notes: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

/// Raw equipment row
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentRow {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub status: String,
    pub total_quantity: i32,
    pub available_quantity: i32,
    pub notes: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

impl TryFrom<EquipmentRow> for EquipmentItem {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            category: row.category,
            serial_number: row.serial_number,
            status: parse_column("equipment.status", &row.status)?,
            total_quantity: row.total_quantity,
            available_quantity: row.available_quantity,
            notes: row.notes,
            crea_date: row.crea_date,
            modif_date: row.modif_date,
        })
    }
}

/// Register equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    #[validate(range(min = 0, message = "Total quantity cannot be negative"))]
    pub total_quantity: i32,
    pub notes: Option<String>,
}

/// Adjust quantity request
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct AdjustQuantity {
    pub total_quantity: i32,
    pub available_quantity: i32,
}

/// Change status request
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct ChangeStatus {
    pub status: EquipmentStatus,
}
