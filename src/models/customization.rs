//! Custom-fabrication requests and their stage history

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use super::parse_column;
use crate::error::{AppError, AppResult};

/// Fabrication stage. Ordered; `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomizationStage {
    Requested,
    Designing,
    Prototyping,
    Fitting,
    Completed,
    Cancelled,
}

text_enum!(CustomizationStage {
    Requested => "requested",
    Designing => "designing",
    Prototyping => "prototyping",
    Fitting => "fitting",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl CustomizationStage {
    pub const ALL: [CustomizationStage; 6] = [
        CustomizationStage::Requested,
        CustomizationStage::Designing,
        CustomizationStage::Prototyping,
        CustomizationStage::Fitting,
        CustomizationStage::Completed,
        CustomizationStage::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, CustomizationStage::Completed | CustomizationStage::Cancelled)
    }

    /// Outgoing edges of the stage graph
    pub fn allowed_next(&self) -> &'static [CustomizationStage] {
        use CustomizationStage::*;
        match self {
            Requested => &[Designing, Cancelled],
            Designing => &[Prototyping, Cancelled],
            Prototyping => &[Fitting, Cancelled],
            Fitting => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: CustomizationStage) -> bool {
        self.allowed_next().contains(&target)
    }
}

/// Free-form metadata attached to a history entry.
///
/// Keys commonly written by clients: `designer`, `technician`, `materials`,
/// `measurements`, `cost_estimate`, `fitting_feedback`. None are enforced and
/// unknown keys round-trip untouched.
pub type StageMetadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomizationRequest {
    pub id: i32,
    pub client_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: CustomizationStage,
    pub requested_date: NaiveDate,
    pub completed_date: Option<NaiveDate>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CustomizationRow {
    pub id: i32,
    pub client_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub requested_date: NaiveDate,
    pub completed_date: Option<NaiveDate>,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

impl TryFrom<CustomizationRow> for CustomizationRequest {
    type Error = AppError;

    fn try_from(row: CustomizationRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            client_id: row.client_id,
            title: row.title,
            description: row.description,
            status: parse_column("customization_requests.status", &row.status)?,
            requested_date: row.requested_date,
            completed_date: row.completed_date,
            crea_date: row.crea_date,
            modif_date: row.modif_date,
        })
    }
}

/// One accepted transition. Never edited or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageHistoryEntry {
    pub id: i32,
    pub request_id: i32,
    pub stage: CustomizationStage,
    pub notes: String,
    #[schema(value_type = Object)]
    pub metadata: StageMetadata,
    /// References into the external file store
    pub attachments: Vec<String>,
    pub stage_date: NaiveDate,
    pub changed_by: Option<i32>,
    pub crea_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StageHistoryRow {
    pub id: i32,
    pub request_id: i32,
    pub stage: String,
    pub notes: String,
    pub metadata: Json<StageMetadata>,
    pub attachments: Vec<String>,
    pub stage_date: NaiveDate,
    pub changed_by: Option<i32>,
    pub crea_date: Option<DateTime<Utc>>,
}

impl TryFrom<StageHistoryRow> for StageHistoryEntry {
    type Error = AppError;

    fn try_from(row: StageHistoryRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            request_id: row.request_id,
            stage: parse_column("customization_stage_history.stage", &row.stage)?,
            notes: row.notes,
            metadata: row.metadata.0,
            attachments: row.attachments,
            stage_date: row.stage_date,
            changed_by: row.changed_by,
            crea_date: row.crea_date,
        })
    }
}

/// History entry ready to be appended
#[derive(Debug, Clone)]
pub struct NewStageHistoryEntry {
    pub request_id: i32,
    pub stage: CustomizationStage,
    pub notes: String,
    pub metadata: StageMetadata,
    pub attachments: Vec<String>,
    pub stage_date: NaiveDate,
    pub changed_by: Option<i32>,
}

/// Intake request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCustomization {
    pub client_id: i32,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    /// Defaults to today
    pub requested_date: Option<NaiveDate>,
}

/// Resolved intake handed to the store
#[derive(Debug, Clone)]
pub struct NewCustomization {
    pub client_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub requested_date: NaiveDate,
}

/// Stage transition request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransitionStage {
    pub target_stage: CustomizationStage,
    pub notes: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<StageMetadata>,
    pub attachments: Option<Vec<String>>,
    /// Defaults to today
    pub stage_date: Option<NaiveDate>,
}

impl TransitionStage {
    pub fn to(target_stage: CustomizationStage) -> Self {
        Self {
            target_stage,
            notes: None,
            metadata: None,
            attachments: None,
            stage_date: None,
        }
    }
}

/// Result of an accepted transition
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    pub request: CustomizationRequest,
    /// `None` when the history append failed; the transition still stands
    pub history_entry: Option<StageHistoryEntry>,
}

/// Default note for a transition without caller notes
pub fn describe_transition(from: CustomizationStage, to: CustomizationStage) -> String {
    format!("{} → {}", from, to)
}
