//! Appointment schedules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::parse_column;
use crate::error::{AppError, AppResult};

/// Longest supported reminder lead time (one day)
pub const MAX_REMINDER_MINUTES: i32 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Consultation,
    Assessment,
    Fitting,
    Delivery,
    Training,
    Maintenance,
    Other,
}

text_enum!(ScheduleType {
    Consultation => "consultation",
    Assessment => "assessment",
    Fitting => "fitting",
    Delivery => "delivery",
    Training => "training",
    Maintenance => "maintenance",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

text_enum!(ScheduleStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl ScheduleStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduleStatus::Scheduled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Schedule {
    pub id: i32,
    pub title: String,
    pub schedule_type: ScheduleType,
    pub client_id: Option<i32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    /// Minutes before `start_time` the reminder fires; 0 disables it
    pub reminder_minutes: i32,
    pub location: Option<String>,
    pub participant_ids: Vec<i32>,
    pub notes: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub id: i32,
    pub title: String,
    pub schedule_type: String,
    pub client_id: Option<i32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub reminder_minutes: i32,
    pub location: Option<String>,
    pub participant_ids: Vec<i32>,
    pub notes: Option<String>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = AppError;

    fn try_from(row: ScheduleRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            schedule_type: parse_column("schedules.schedule_type", &row.schedule_type)?,
            client_id: row.client_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: parse_column("schedules.status", &row.status)?,
            reminder_minutes: row.reminder_minutes,
            location: row.location,
            participant_ids: row.participant_ids,
            notes: row.notes,
            crea_date: row.crea_date,
            modif_date: row.modif_date,
        })
    }
}

/// Create schedule request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_time_range"))]
pub struct CreateSchedule {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub schedule_type: ScheduleType,
    pub client_id: Option<i32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 0, max = 1440, message = "Reminder must be between 0 and 1440 minutes"))]
    #[serde(default)]
    pub reminder_minutes: i32,
    pub location: Option<String>,
    #[serde(default)]
    pub participant_ids: Vec<i32>,
    pub notes: Option<String>,
}

fn validate_time_range(data: &CreateSchedule) -> Result<(), ValidationError> {
    if data.end_time <= data.start_time {
        let mut err = ValidationError::new("end_time");
        err.message = Some("End time must be after start time".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct UpdateScheduleStatus {
    pub status: ScheduleStatus,
}

/// Query parameters for upcoming schedules
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ScheduleQuery {
    /// Only schedules starting at or after this instant (defaults to now)
    pub from: Option<DateTime<Utc>>,
    /// Only schedules starting before this instant
    pub until: Option<DateTime<Utc>>,
}
