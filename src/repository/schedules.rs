//! Schedules repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::ScheduleStore;
use crate::{
    error::{AppError, AppResult},
    models::schedule::{CreateSchedule, Schedule, ScheduleRow, ScheduleStatus},
};

#[derive(Clone)]
pub struct SchedulesRepository {
    pool: Pool<Postgres>,
}

impl SchedulesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for SchedulesRepository {
    async fn get(&self, id: i32) -> AppResult<Schedule> {
        sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))?
            .try_into()
    }

    async fn list_between(&self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> AppResult<Vec<Schedule>> {
        sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT * FROM schedules
            WHERE start_time >= $1 AND ($2::timestamptz IS NULL OR start_time < $2)
            ORDER BY start_time, id
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Schedule::try_from)
        .collect()
    }

    async fn insert(&self, data: &CreateSchedule) -> AppResult<Schedule> {
        sqlx::query_as::<_, ScheduleRow>(
            r#"
            INSERT INTO schedules
                (title, schedule_type, client_id, start_time, end_time, status,
                 reminder_minutes, location, participant_ids, notes, crea_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(data.schedule_type.as_str())
        .bind(data.client_id)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(ScheduleStatus::Scheduled.as_str())
        .bind(data.reminder_minutes)
        .bind(&data.location)
        .bind(&data.participant_ids)
        .bind(&data.notes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn update_status(
        &self,
        id: i32,
        expected: ScheduleStatus,
        target: ScheduleStatus,
    ) -> AppResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            UPDATE schedules
            SET status = $3, modif_date = $4
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(target.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Schedule::try_from).transpose()
    }
}
