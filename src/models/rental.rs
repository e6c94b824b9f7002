//! Rental model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::parse_column;
use crate::error::{AppError, AppResult};

/// Rental status. `returned` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Returned,
    Cancelled,
}

text_enum!(RentalStatus {
    Active => "active",
    Returned => "returned",
    Cancelled => "cancelled",
});

impl RentalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RentalStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rental {
    pub id: i32,
    pub equipment_id: i32,
    pub client_id: i32,
    pub quantity: i32,
    pub status: RentalStatus,
    pub rental_date: NaiveDate,
    pub expected_return_date: Option<NaiveDate>,
    pub actual_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RentalRow {
    pub id: i32,
    pub equipment_id: i32,
    pub client_id: i32,
    pub quantity: i32,
    pub status: String,
    pub rental_date: NaiveDate,
    pub expected_return_date: Option<NaiveDate>,
    pub actual_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

impl TryFrom<RentalRow> for Rental {
    type Error = AppError;

    fn try_from(row: RentalRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            equipment_id: row.equipment_id,
            client_id: row.client_id,
            quantity: row.quantity,
            status: parse_column("rentals.status", &row.status)?,
            rental_date: row.rental_date,
            expected_return_date: row.expected_return_date,
            actual_return_date: row.actual_return_date,
            notes: row.notes,
            crea_date: row.crea_date,
            modif_date: row.modif_date,
        })
    }
}

/// Grant a rental
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_rental_dates"))]
pub struct CreateRental {
    pub equipment_id: i32,
    pub client_id: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Defaults to today
    pub rental_date: Option<NaiveDate>,
    pub expected_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

fn validate_rental_dates(data: &CreateRental) -> Result<(), ValidationError> {
    if let (Some(start), Some(expected)) = (data.rental_date, data.expected_return_date) {
        if expected < start {
            let mut err = ValidationError::new("expected_return_date");
            err.message = Some("Expected return date precedes rental date".into());
            return Err(err);
        }
    }
    Ok(())
}

/// Fully resolved rental handed to the store
#[derive(Debug, Clone)]
pub struct NewRental {
    pub equipment_id: i32,
    pub client_id: i32,
    pub quantity: i32,
    pub rental_date: NaiveDate,
    pub expected_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnRental {
    /// Defaults to today
    pub actual_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelRental {
    pub notes: Option<String>,
}

/// Terminal update applied to an active rental together with the quantity release
#[derive(Debug, Clone)]
pub struct RentalClosure {
    pub status: RentalStatus,
    pub actual_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Append `addition` to `existing`, newline separated
pub fn join_notes(existing: Option<&str>, addition: Option<&str>) -> Option<String> {
    let addition = addition.map(str::trim).filter(|s| !s.is_empty());
    match (existing.filter(|s| !s.is_empty()), addition) {
        (Some(old), Some(new)) => Some(format!("{}\n{}", old, new)),
        (Some(old), None) => Some(old.to_string()),
        (None, Some(new)) => Some(new.to_string()),
        (None, None) => None,
    }
}
