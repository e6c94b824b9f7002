//! Record store access.
//!
//! Each domain has a store trait describing the narrow, per-call atomic
//! operations the services rely on. Two implementations exist: Postgres
//! (`sqlx`) for the server and an in-memory store for tests and embedding.
//!
//! Store contracts the services depend on:
//! - `RentalStore::create_reserving` inserts a rental and decrements the
//!   item's `available_quantity` as one unit, or does neither.
//! - `RentalStore::close_releasing` moves an *active* rental to a terminal
//!   status and gives its quantity back as one unit. It is a no-op returning
//!   `None` when the rental is no longer active, so a release can never
//!   happen twice.
//! - `CustomizationStore::update_stage` and `ScheduleStore::update_status`
//!   only apply when the stored status still equals the expected one.

pub mod customizations;
pub mod equipment;
pub mod memory;
pub mod rentals;
pub mod schedules;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        customization::{
            CustomizationRequest, CustomizationStage, NewCustomization, NewStageHistoryEntry,
            StageHistoryEntry,
        },
        equipment::{CreateEquipment, EquipmentItem, EquipmentStatus},
        rental::{NewRental, Rental, RentalClosure},
        schedule::{CreateSchedule, Schedule, ScheduleStatus},
    },
};

pub use memory::MemoryStore;

#[async_trait]
pub trait EquipmentStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<EquipmentItem>;
    async fn list(&self) -> AppResult<Vec<EquipmentItem>>;
    /// Registers an item with `available_quantity = total_quantity`
    async fn insert(&self, data: &CreateEquipment) -> AppResult<EquipmentItem>;
    async fn update_quantities(&self, id: i32, total: i32, available: i32) -> AppResult<EquipmentItem>;
    async fn update_status(&self, id: i32, status: EquipmentStatus) -> AppResult<EquipmentItem>;
    async fn delete(&self, id: i32) -> AppResult<()>;
    /// Sum of `quantity` over active rentals of the item
    async fn active_rental_quantity(&self, id: i32) -> AppResult<i64>;
    async fn count_active_rentals(&self, id: i32) -> AppResult<i64>;
}

#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<Rental>;
    async fn list_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<Rental>>;
    /// Insert the rental and reserve its quantity atomically
    async fn create_reserving(&self, data: &NewRental) -> AppResult<Rental>;
    /// Close an active rental and release its quantity atomically
    async fn close_releasing(&self, id: i32, closure: &RentalClosure) -> AppResult<Option<Rental>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomizationStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<CustomizationRequest>;
    async fn insert(&self, data: &NewCustomization) -> AppResult<CustomizationRequest>;
    /// Compare-and-set on the stage; `None` when `expected` no longer matches
    async fn update_stage(
        &self,
        id: i32,
        expected: CustomizationStage,
        target: CustomizationStage,
        completed_date: Option<NaiveDate>,
    ) -> AppResult<Option<CustomizationRequest>>;
    async fn append_history(&self, entry: &NewStageHistoryEntry) -> AppResult<StageHistoryEntry>;
    async fn history(&self, request_id: i32) -> AppResult<Vec<StageHistoryEntry>>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<Schedule>;
    /// Schedules starting in `[from, until)`, ordered by start time
    async fn list_between(&self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> AppResult<Vec<Schedule>>;
    async fn insert(&self, data: &CreateSchedule) -> AppResult<Schedule>;
    /// Compare-and-set on the status; `None` when `expected` no longer matches
    async fn update_status(
        &self,
        id: i32,
        expected: ScheduleStatus,
        target: ScheduleStatus,
    ) -> AppResult<Option<Schedule>>;
}

/// Handles to every domain store
#[derive(Clone)]
pub struct Repository {
    pub equipment: Arc<dyn EquipmentStore>,
    pub rentals: Arc<dyn RentalStore>,
    pub customizations: Arc<dyn CustomizationStore>,
    pub schedules: Arc<dyn ScheduleStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            equipment: Arc::new(equipment::EquipmentRepository::new(pool.clone())),
            rentals: Arc::new(rentals::RentalsRepository::new(pool.clone())),
            customizations: Arc::new(customizations::CustomizationsRepository::new(pool.clone())),
            schedules: Arc::new(schedules::SchedulesRepository::new(pool)),
        }
    }

    /// Create a repository whose stores all share one in-memory store
    pub fn in_memory(store: MemoryStore) -> Self {
        Self {
            equipment: Arc::new(store.clone()),
            rentals: Arc::new(store.clone()),
            customizations: Arc::new(store.clone()),
            schedules: Arc::new(store),
        }
    }
}
