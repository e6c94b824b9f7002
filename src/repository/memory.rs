//! In-memory record store.
//!
//! All tables sit behind one mutex, so every trait call is atomic in the same
//! way a single Postgres statement or transaction is.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{CustomizationStore, EquipmentStore, RentalStore, ScheduleStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        customization::{
            CustomizationRequest, CustomizationStage, NewCustomization, NewStageHistoryEntry,
            StageHistoryEntry,
        },
        equipment::{CreateEquipment, EquipmentItem, EquipmentStatus},
        rental::{NewRental, Rental, RentalClosure, RentalStatus},
        schedule::{CreateSchedule, Schedule, ScheduleStatus},
    },
};

#[derive(Default)]
struct Tables {
    equipment: BTreeMap<i32, EquipmentItem>,
    rentals: BTreeMap<i32, Rental>,
    customizations: BTreeMap<i32, CustomizationRequest>,
    history: Vec<StageHistoryEntry>,
    schedules: BTreeMap<i32, Schedule>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn equipment_mut(&mut self, id: i32) -> AppResult<&mut EquipmentItem> {
        self.equipment
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    fn active_rentals(&self, equipment_id: i32) -> impl Iterator<Item = &Rental> {
        self.rentals
            .values()
            .filter(move |r| r.equipment_id == equipment_id && r.status == RentalStatus::Active)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl EquipmentStore for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<EquipmentItem> {
        let mut tables = self.lock()?;
        tables.equipment_mut(id).map(|item| item.clone())
    }

    async fn list(&self) -> AppResult<Vec<EquipmentItem>> {
        let tables = self.lock()?;
        let mut items: Vec<_> = tables.equipment.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn insert(&self, data: &CreateEquipment) -> AppResult<EquipmentItem> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        let item = EquipmentItem {
            id,
            name: data.name.clone(),
            category: data.category.clone(),
            serial_number: data.serial_number.clone(),
            status: EquipmentStatus::Normal,
            total_quantity: data.total_quantity,
            available_quantity: data.total_quantity,
            notes: data.notes.clone(),
            crea_date: Some(Utc::now()),
            modif_date: None,
        };
        tables.equipment.insert(id, item.clone());
        Ok(item)
    }

    async fn update_quantities(&self, id: i32, total: i32, available: i32) -> AppResult<EquipmentItem> {
        let mut tables = self.lock()?;
        let item = tables.equipment_mut(id)?;
        item.total_quantity = total;
        item.available_quantity = available;
        item.modif_date = Some(Utc::now());
        Ok(item.clone())
    }

    async fn update_status(&self, id: i32, status: EquipmentStatus) -> AppResult<EquipmentItem> {
        let mut tables = self.lock()?;
        let item = tables.equipment_mut(id)?;
        item.status = status;
        item.modif_date = Some(Utc::now());
        Ok(item.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.lock()?;
        tables
            .equipment
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn active_rental_quantity(&self, id: i32) -> AppResult<i64> {
        let tables = self.lock()?;
        Ok(tables.active_rentals(id).map(|r| i64::from(r.quantity)).sum())
    }

    async fn count_active_rentals(&self, id: i32) -> AppResult<i64> {
        let tables = self.lock()?;
        Ok(tables.active_rentals(id).count() as i64)
    }
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<Rental> {
        let tables = self.lock()?;
        tables
            .rentals
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))
    }

    async fn list_for_equipment(&self, equipment_id: i32) -> AppResult<Vec<Rental>> {
        let tables = self.lock()?;
        let mut rentals: Vec<_> = tables
            .rentals
            .values()
            .filter(|r| r.equipment_id == equipment_id)
            .cloned()
            .collect();
        rentals.sort_by(|a, b| b.rental_date.cmp(&a.rental_date).then(b.id.cmp(&a.id)));
        Ok(rentals)
    }

    async fn create_reserving(&self, data: &NewRental) -> AppResult<Rental> {
        let mut tables = self.lock()?;
        let now = Utc::now();

        let item = tables.equipment_mut(data.equipment_id)?;
        if item.status == EquipmentStatus::Retired {
            return Err(AppError::TerminalState {
                entity: "equipment",
                state: item.status.to_string(),
            });
        }
        if item.available_quantity < data.quantity {
            return Err(AppError::InvalidQuantity {
                message: format!(
                    "Requested {} unit(s) but only {} available",
                    data.quantity, item.available_quantity
                ),
                minimum_available: None,
                maximum_available: Some(item.available_quantity),
            });
        }
        item.available_quantity -= data.quantity;
        item.modif_date = Some(now);

        let id = tables.next_id();
        let rental = Rental {
            id,
            equipment_id: data.equipment_id,
            client_id: data.client_id,
            quantity: data.quantity,
            status: RentalStatus::Active,
            rental_date: data.rental_date,
            expected_return_date: data.expected_return_date,
            actual_return_date: None,
            notes: data.notes.clone(),
            crea_date: Some(now),
            modif_date: None,
        };
        tables.rentals.insert(id, rental.clone());
        Ok(rental)
    }

    async fn close_releasing(&self, id: i32, closure: &RentalClosure) -> AppResult<Option<Rental>> {
        let mut tables = self.lock()?;
        let now = Utc::now();

        let rental = match tables.rentals.get_mut(&id) {
            Some(r) if r.status == RentalStatus::Active => r,
            Some(_) => return Ok(None),
            None => return Err(AppError::NotFound(format!("Rental {} not found", id))),
        };
        rental.status = closure.status;
        rental.actual_return_date = closure.actual_return_date;
        rental.notes = closure.notes.clone();
        rental.modif_date = Some(now);
        let rental = rental.clone();

        if let Some(item) = tables.equipment.get_mut(&rental.equipment_id) {
            item.available_quantity = (item.available_quantity + rental.quantity).min(item.total_quantity);
            item.modif_date = Some(now);
        }
        Ok(Some(rental))
    }
}

#[async_trait]
impl CustomizationStore for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<CustomizationRequest> {
        let tables = self.lock()?;
        tables
            .customizations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Customization request {} not found", id)))
    }

    async fn insert(&self, data: &NewCustomization) -> AppResult<CustomizationRequest> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        let request = CustomizationRequest {
            id,
            client_id: data.client_id,
            title: data.title.clone(),
            description: data.description.clone(),
            status: CustomizationStage::Requested,
            requested_date: data.requested_date,
            completed_date: None,
            crea_date: Some(Utc::now()),
            modif_date: None,
        };
        tables.customizations.insert(id, request.clone());
        Ok(request)
    }

    async fn update_stage(
        &self,
        id: i32,
        expected: CustomizationStage,
        target: CustomizationStage,
        completed_date: Option<NaiveDate>,
    ) -> AppResult<Option<CustomizationRequest>> {
        let mut tables = self.lock()?;
        let request = tables
            .customizations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Customization request {} not found", id)))?;
        if request.status != expected {
            return Ok(None);
        }
        request.status = target;
        if completed_date.is_some() {
            request.completed_date = completed_date;
        }
        request.modif_date = Some(Utc::now());
        Ok(Some(request.clone()))
    }

    async fn append_history(&self, entry: &NewStageHistoryEntry) -> AppResult<StageHistoryEntry> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        let stored = StageHistoryEntry {
            id,
            request_id: entry.request_id,
            stage: entry.stage,
            notes: entry.notes.clone(),
            metadata: entry.metadata.clone(),
            attachments: entry.attachments.clone(),
            stage_date: entry.stage_date,
            changed_by: entry.changed_by,
            crea_date: Some(Utc::now()),
        };
        tables.history.push(stored.clone());
        Ok(stored)
    }

    async fn history(&self, request_id: i32) -> AppResult<Vec<StageHistoryEntry>> {
        let tables = self.lock()?;
        let mut entries: Vec<_> = tables
            .history
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.stage_date.cmp(&b.stage_date).then(a.id.cmp(&b.id)));
        Ok(entries)
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<Schedule> {
        let tables = self.lock()?;
        tables
            .schedules
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))
    }

    async fn list_between(&self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> AppResult<Vec<Schedule>> {
        let tables = self.lock()?;
        let mut schedules: Vec<_> = tables
            .schedules
            .values()
            .filter(|s| s.start_time >= from && until.map_or(true, |u| s.start_time < u))
            .cloned()
            .collect();
        schedules.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(schedules)
    }

    async fn insert(&self, data: &CreateSchedule) -> AppResult<Schedule> {
        let mut tables = self.lock()?;
        let id = tables.next_id();
        let schedule = Schedule {
            id,
            title: data.title.clone(),
            schedule_type: data.schedule_type,
            client_id: data.client_id,
            start_time: data.start_time,
            end_time: data.end_time,
            status: ScheduleStatus::Scheduled,
            reminder_minutes: data.reminder_minutes,
            location: data.location.clone(),
            participant_ids: data.participant_ids.clone(),
            notes: data.notes.clone(),
            crea_date: Some(Utc::now()),
            modif_date: None,
        };
        tables.schedules.insert(id, schedule.clone());
        Ok(schedule)
    }

    async fn update_status(
        &self,
        id: i32,
        expected: ScheduleStatus,
        target: ScheduleStatus,
    ) -> AppResult<Option<Schedule>> {
        let mut tables = self.lock()?;
        let schedule = tables
            .schedules
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))?;
        if schedule.status != expected {
            return Ok(None);
        }
        schedule.status = target;
        schedule.modif_date = Some(Utc::now());
        Ok(Some(schedule.clone()))
    }
}
