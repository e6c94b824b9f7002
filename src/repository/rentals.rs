//! Rentals repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::RentalStore;
use crate::{
    error::{AppError, AppResult},
    models::rental::{NewRental, Rental, RentalClosure, RentalRow, RentalStatus},
};

#[derive(Clone)]
pub struct RentalsRepository {
    pool: Pool<Postgres>,
}

impl RentalsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RentalStore for RentalsRepository {
    async fn get(&self, id: i32) -> AppResult<Rental> {
        sqlx::query_as::<_, RentalRow>("SELECT * FROM rentals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))?
            .try_into()
    }

    async fn list_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<Rental>> {
        sqlx::query_as::<_, RentalRow>(
            "SELECT * FROM rentals WHERE equipment_id = $1 ORDER BY rental_date DESC, id DESC",
        )
        .bind(equipment_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Rental::try_from)
        .collect()
    }

    async fn create_reserving(&self, data: &NewRental) -> AppResult<Rental> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Reserve first: the conditional decrement is the availability check
        let reserved: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE equipment
            SET available_quantity = available_quantity - $2, modif_date = $3
            WHERE id = $1 AND available_quantity >= $2 AND status <> 'retired'
            RETURNING available_quantity
            "#,
        )
        .bind(data.equipment_id)
        .bind(data.quantity)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if reserved.is_none() {
            let current: Option<(i32, String)> = sqlx::query_as(
                "SELECT available_quantity, status FROM equipment WHERE id = $1",
            )
            .bind(data.equipment_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Err(match current {
                None => AppError::NotFound(format!("Equipment {} not found", data.equipment_id)),
                Some((_, status)) if status == "retired" => AppError::TerminalState {
                    entity: "equipment",
                    state: status,
                },
                Some((available, _)) => AppError::InvalidQuantity {
                    message: format!(
                        "Requested {} unit(s) but only {} available",
                        data.quantity, available
                    ),
                    minimum_available: None,
                    maximum_available: Some(available),
                },
            });
        }

        let row = sqlx::query_as::<_, RentalRow>(
            r#"
            INSERT INTO rentals
                (equipment_id, client_id, quantity, status, rental_date, expected_return_date, notes, crea_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.equipment_id)
        .bind(data.client_id)
        .bind(data.quantity)
        .bind(RentalStatus::Active.as_str())
        .bind(data.rental_date)
        .bind(data.expected_return_date)
        .bind(&data.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn close_releasing(&self, id: i32, closure: &RentalClosure) -> AppResult<Option<Rental>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, RentalRow>(
            r#"
            UPDATE rentals
            SET status = $2, actual_return_date = $3, notes = $4, modif_date = $5
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(closure.status.as_str())
        .bind(closure.actual_return_date)
        .bind(&closure.notes)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = closed else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Capped at the total in case availability was declared above the committed minimum
        sqlx::query(
            r#"
            UPDATE equipment
            SET available_quantity = LEAST(available_quantity + $2, total_quantity), modif_date = $3
            WHERE id = $1
            "#,
        )
        .bind(row.equipment_id)
        .bind(row.quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.try_into()?))
    }
}
