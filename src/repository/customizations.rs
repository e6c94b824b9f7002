//! Customization requests repository for database operations

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{types::Json, Pool, Postgres};

use super::CustomizationStore;
use crate::{
    error::{AppError, AppResult},
    models::customization::{
        CustomizationRequest, CustomizationRow, CustomizationStage, NewCustomization,
        NewStageHistoryEntry, StageHistoryEntry, StageHistoryRow,
    },
};

#[derive(Clone)]
pub struct CustomizationsRepository {
    pool: Pool<Postgres>,
}

impl CustomizationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomizationStore for CustomizationsRepository {
    async fn get(&self, id: i32) -> AppResult<CustomizationRequest> {
        sqlx::query_as::<_, CustomizationRow>("SELECT * FROM customization_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customization request {} not found", id)))?
            .try_into()
    }

    async fn insert(&self, data: &NewCustomization) -> AppResult<CustomizationRequest> {
        sqlx::query_as::<_, CustomizationRow>(
            r#"
            INSERT INTO customization_requests
                (client_id, title, description, status, requested_date, crea_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.client_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(CustomizationStage::Requested.as_str())
        .bind(data.requested_date)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn update_stage(
        &self,
        id: i32,
        expected: CustomizationStage,
        target: CustomizationStage,
        completed_date: Option<NaiveDate>,
    ) -> AppResult<Option<CustomizationRequest>> {
        let row = sqlx::query_as::<_, CustomizationRow>(
            r#"
            UPDATE customization_requests
            SET status = $3, completed_date = COALESCE($4, completed_date), modif_date = $5
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(target.as_str())
        .bind(completed_date)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CustomizationRequest::try_from).transpose()
    }

    async fn append_history(&self, entry: &NewStageHistoryEntry) -> AppResult<StageHistoryEntry> {
        sqlx::query_as::<_, StageHistoryRow>(
            r#"
            INSERT INTO customization_stage_history
                (request_id, stage, notes, metadata, attachments, stage_date, changed_by, crea_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(entry.request_id)
        .bind(entry.stage.as_str())
        .bind(&entry.notes)
        .bind(Json(&entry.metadata))
        .bind(&entry.attachments)
        .bind(entry.stage_date)
        .bind(entry.changed_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn history(&self, request_id: i32) -> AppResult<Vec<StageHistoryEntry>> {
        sqlx::query_as::<_, StageHistoryRow>(
            "SELECT * FROM customization_stage_history WHERE request_id = $1 ORDER BY stage_date, id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(StageHistoryEntry::try_from)
        .collect()
    }
}
