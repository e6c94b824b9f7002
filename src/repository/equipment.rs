//! Equipment repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::EquipmentStore;
use crate::{
    error::{AppError, AppResult},
    models::equipment::{CreateEquipment, EquipmentItem, EquipmentRow, EquipmentStatus},
};

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Equipment {} not found", id))
}

#[async_trait]
impl EquipmentStore for EquipmentRepository {
    async fn get(&self, id: i32) -> AppResult<EquipmentItem> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?
            .try_into()
    }

    async fn list(&self) -> AppResult<Vec<EquipmentItem>> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment ORDER BY name")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(EquipmentItem::try_from)
            .collect()
    }

    async fn insert(&self, data: &CreateEquipment) -> AppResult<EquipmentItem> {
        sqlx::query_as::<_, EquipmentRow>(
            r#"
            INSERT INTO equipment
                (name, category, serial_number, status, total_quantity, available_quantity, notes, crea_date)
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.category)
        .bind(&data.serial_number)
        .bind(EquipmentStatus::Normal.as_str())
        .bind(data.total_quantity)
        .bind(&data.notes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn update_quantities(&self, id: i32, total: i32, available: i32) -> AppResult<EquipmentItem> {
        sqlx::query_as::<_, EquipmentRow>(
            r#"
            UPDATE equipment
            SET total_quantity = $2, available_quantity = $3, modif_date = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(total)
        .bind(available)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?
        .try_into()
    }

    async fn update_status(&self, id: i32, status: EquipmentStatus) -> AppResult<EquipmentItem> {
        sqlx::query_as::<_, EquipmentRow>(
            "UPDATE equipment SET status = $2, modif_date = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?
        .try_into()
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn active_rental_quantity(&self, id: i32) -> AppResult<i64> {
        let rented: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::bigint FROM rentals WHERE equipment_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(rented)
    }

    async fn count_active_rentals(&self, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE equipment_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
