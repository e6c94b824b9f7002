//! Equipment inventory ledger

use std::sync::Arc;

use serde_json::json;
use validator::Validate;

use super::audit::AuditSink;
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::AuditEntry,
        equipment::{CreateEquipment, EquipmentItem, EquipmentStatus},
        role::{ActorContext, Operation},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
}

/// Allowed `[minimum, maximum]` for `available_quantity` given a new total
fn available_bounds(total: i32, rented: i64) -> (i32, i32) {
    let minimum = (i64::from(total) - rented).clamp(0, i64::from(total.max(0)));
    (minimum as i32, total.max(0))
}

impl InventoryService {
    pub fn new(repository: Repository, audit: Arc<dyn AuditSink>) -> Self {
        Self { repository, audit }
    }

    pub async fn get(&self, ctx: &ActorContext, id: i32) -> AppResult<EquipmentItem> {
        ctx.require(Operation::ViewEquipment)?;
        self.repository.equipment.get(id).await
    }

    pub async fn list(&self, ctx: &ActorContext) -> AppResult<Vec<EquipmentItem>> {
        ctx.require(Operation::ViewEquipment)?;
        self.repository.equipment.list().await
    }

    /// Register an item; it starts `normal` with everything available
    pub async fn register(&self, ctx: &ActorContext, data: CreateEquipment) -> AppResult<EquipmentItem> {
        ctx.require(Operation::RegisterEquipment)?;
        data.validate()?;

        let item = self.repository.equipment.insert(&data).await?;
        tracing::info!(equipment_id = item.id, total = item.total_quantity, "Equipment registered");
        self.audit.record(
            "equipment.registered",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({ "id": item.id, "after": { "total_quantity": item.total_quantity, "status": item.status } }),
            )
            .tag("equipment"),
        );
        Ok(item)
    }

    /// Set both quantities at once.
    ///
    /// `new_available` must lie in `[new_total - rented, new_total]` where
    /// `rented` is the quantity held by active rentals.
    pub async fn adjust_quantity(
        &self,
        ctx: &ActorContext,
        id: i32,
        new_total: i32,
        new_available: i32,
    ) -> AppResult<EquipmentItem> {
        ctx.require(Operation::AdjustQuantity)?;

        let before = self.repository.equipment.get(id).await?;
        if new_total < 0 {
            return Err(AppError::InvalidQuantity {
                message: "Total quantity cannot be negative".to_string(),
                minimum_available: None,
                maximum_available: None,
            });
        }

        let rented = self.repository.equipment.active_rental_quantity(id).await?;
        let (minimum, maximum) = available_bounds(new_total, rented);
        if new_available < minimum || new_available > maximum {
            return Err(AppError::InvalidQuantity {
                message: format!(
                    "Available quantity {} outside [{}, {}] ({} unit(s) on active rentals)",
                    new_available, minimum, maximum, rented
                ),
                minimum_available: Some(minimum),
                maximum_available: Some(maximum),
            });
        }

        let after = self
            .repository
            .equipment
            .update_quantities(id, new_total, new_available)
            .await?;

        tracing::info!(
            equipment_id = id,
            total = new_total,
            available = new_available,
            rented,
            "Equipment quantity adjusted"
        );
        self.audit.record(
            "equipment.quantity_adjusted",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({
                    "id": id,
                    "before": { "total_quantity": before.total_quantity, "available_quantity": before.available_quantity },
                    "after": { "total_quantity": after.total_quantity, "available_quantity": after.available_quantity },
                }),
            )
            .tag("equipment"),
        );
        Ok(after)
    }

    /// Change the operational status. Retirement cannot be undone.
    pub async fn change_status(
        &self,
        ctx: &ActorContext,
        id: i32,
        new_status: EquipmentStatus,
    ) -> AppResult<EquipmentItem> {
        ctx.require(Operation::ChangeEquipmentStatus)?;

        let before = self.repository.equipment.get(id).await?;
        if !before.status.can_transition_to(new_status) {
            return Err(AppError::illegal_transition(
                "equipment",
                before.status,
                new_status,
                before.status.allowed_next(),
            ));
        }

        let after = self.repository.equipment.update_status(id, new_status).await?;
        tracing::info!(equipment_id = id, from = %before.status, to = %after.status, "Equipment status changed");
        self.audit.record(
            "equipment.status_changed",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({ "id": id, "before": { "status": before.status }, "after": { "status": after.status } }),
            )
            .tag("equipment"),
        );
        Ok(after)
    }

    pub async fn delete(&self, ctx: &ActorContext, id: i32) -> AppResult<()> {
        ctx.require(Operation::DeleteEquipment)?;

        let before = self.repository.equipment.get(id).await?;
        let count = self.repository.equipment.count_active_rentals(id).await?;
        if count > 0 {
            return Err(AppError::HasActiveRentals { equipment_id: id, count });
        }

        self.repository.equipment.delete(id).await?;
        tracing::info!(equipment_id = id, "Equipment deleted");
        self.audit.record(
            "equipment.deleted",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({ "id": id, "before": { "name": before.name, "status": before.status } }),
            )
            .tag("equipment"),
        );
        Ok(())
    }
}
