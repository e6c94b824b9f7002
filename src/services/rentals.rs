//! Rental lifecycle: create reserves, return or cancel releases, exactly once

use std::sync::Arc;

use serde_json::json;
use validator::Validate;

use super::{audit::AuditSink, clock::Clock};
use crate::{
    config::RentalsConfig,
    error::{AppError, AppResult},
    models::{
        audit::AuditEntry,
        equipment::EquipmentStatus,
        rental::{join_notes, CreateRental, NewRental, Rental, RentalClosure, RentalStatus, ReturnRental},
        role::{ActorContext, Operation},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: RentalsConfig,
}

/// Error for a rental that already left `active`
fn terminal_error(rental: &Rental) -> AppError {
    match rental.status {
        RentalStatus::Returned => AppError::AlreadyReturned(rental.id),
        RentalStatus::Cancelled => AppError::AlreadyCancelled(rental.id),
        RentalStatus::Active => AppError::Conflict(format!("Rental {} changed concurrently", rental.id)),
    }
}

impl RentalsService {
    pub fn new(
        repository: Repository,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: RentalsConfig,
    ) -> Self {
        Self {
            repository,
            audit,
            clock,
            config,
        }
    }

    pub async fn get(&self, ctx: &ActorContext, id: i32) -> AppResult<Rental> {
        ctx.require(Operation::ViewRentals)?;
        self.repository.rentals.get(id).await
    }

    /// Rentals on an item, newest first
    pub async fn list_for_equipment(&self, ctx: &ActorContext, equipment_id: i32) -> AppResult<Vec<Rental>> {
        ctx.require(Operation::ViewRentals)?;
        self.repository.equipment.get(equipment_id).await?;
        self.repository.rentals.list_for_equipment(equipment_id).await
    }

    /// Grant a rental, reserving its quantity on the item
    pub async fn create(&self, ctx: &ActorContext, data: CreateRental) -> AppResult<Rental> {
        ctx.require(Operation::CreateRental)?;
        data.validate()?;

        let rental_date = data.rental_date.unwrap_or_else(|| self.clock.today());
        if matches!(data.expected_return_date, Some(expected) if expected < rental_date) {
            return Err(AppError::Validation(
                "Expected return date precedes rental date".to_string(),
            ));
        }

        let item = self.repository.equipment.get(data.equipment_id).await?;
        match item.status {
            EquipmentStatus::Retired => {
                return Err(AppError::TerminalState {
                    entity: "equipment",
                    state: item.status.to_string(),
                })
            }
            EquipmentStatus::Maintenance if self.config.block_maintenance => {
                return Err(AppError::Conflict(format!(
                    "Equipment {} is under maintenance",
                    item.id
                )))
            }
            _ => {}
        }

        let rental = self
            .repository
            .rentals
            .create_reserving(&NewRental {
                equipment_id: data.equipment_id,
                client_id: data.client_id,
                quantity: data.quantity,
                rental_date,
                expected_return_date: data.expected_return_date,
                notes: data.notes.filter(|n| !n.trim().is_empty()),
            })
            .await?;

        tracing::info!(
            rental_id = rental.id,
            equipment_id = rental.equipment_id,
            quantity = rental.quantity,
            "Rental created"
        );
        self.audit.record(
            "rental.created",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({
                    "id": rental.id,
                    "equipment_id": rental.equipment_id,
                    "after": { "status": rental.status, "quantity": rental.quantity },
                }),
            )
            .tag("rental"),
        );
        Ok(rental)
    }

    /// Mark an active rental returned and give its quantity back
    pub async fn return_rental(&self, ctx: &ActorContext, id: i32, data: ReturnRental) -> AppResult<Rental> {
        ctx.require(Operation::ReturnRental)?;

        let rental = self.repository.rentals.get(id).await?;
        if rental.status.is_terminal() {
            return Err(terminal_error(&rental));
        }

        let closure = RentalClosure {
            status: RentalStatus::Returned,
            actual_return_date: Some(data.actual_return_date.unwrap_or_else(|| self.clock.today())),
            notes: join_notes(rental.notes.as_deref(), data.notes.as_deref()),
        };
        self.close(ctx, rental, closure, "rental.returned").await
    }

    /// Cancel an active rental and give its quantity back
    pub async fn cancel_rental(&self, ctx: &ActorContext, id: i32, notes: Option<String>) -> AppResult<Rental> {
        ctx.require(Operation::CancelRental)?;

        let rental = self.repository.rentals.get(id).await?;
        if rental.status.is_terminal() {
            return Err(terminal_error(&rental));
        }

        let closure = RentalClosure {
            status: RentalStatus::Cancelled,
            actual_return_date: None,
            notes: join_notes(rental.notes.as_deref(), notes.as_deref()),
        };
        self.close(ctx, rental, closure, "rental.cancelled").await
    }

    async fn close(
        &self,
        ctx: &ActorContext,
        before: Rental,
        closure: RentalClosure,
        event: &str,
    ) -> AppResult<Rental> {
        let closed = match self.repository.rentals.close_releasing(before.id, &closure).await? {
            Some(rental) => rental,
            None => {
                // Another caller closed it between our read and the update
                let current = self.repository.rentals.get(before.id).await?;
                tracing::warn!(rental_id = before.id, status = %current.status, "Rental closed concurrently");
                return Err(terminal_error(&current));
            }
        };

        tracing::info!(
            rental_id = closed.id,
            equipment_id = closed.equipment_id,
            quantity = closed.quantity,
            status = %closed.status,
            "Rental closed, quantity released"
        );
        self.audit.record(
            event,
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({
                    "id": closed.id,
                    "equipment_id": closed.equipment_id,
                    "released_quantity": closed.quantity,
                    "before": { "status": before.status },
                    "after": { "status": closed.status, "actual_return_date": closed.actual_return_date },
                }),
            )
            .tag("rental"),
        );
        Ok(closed)
    }
}
