//! Shared fixtures

use std::sync::Arc;

use caseworks_server::{
    config::AppConfig,
    models::{
        equipment::{CreateEquipment, EquipmentItem},
        role::{ActorContext, Role},
    },
    repository::{MemoryStore, Repository},
    services::{audit::MemoryAuditSink, clock::ManualClock, Services},
};
use chrono::{DateTime, TimeZone, Utc};

pub struct Harness {
    pub repository: Repository,
    pub services: Services,
    pub audit: Arc<MemoryAuditSink>,
    pub clock: Arc<ManualClock>,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with(AppConfig::default())
}

pub fn harness_with(config: AppConfig) -> Harness {
    let repository = Repository::in_memory(MemoryStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let services = Services::new(repository.clone(), audit.clone(), clock.clone(), &config);
    Harness {
        repository,
        services,
        audit,
        clock,
    }
}

pub fn admin() -> ActorContext {
    ActorContext::new(1, Role::Admin)
}

pub fn therapist() -> ActorContext {
    ActorContext::new(2, Role::Therapist)
}

pub async fn register(harness: &Harness, name: &str, total: i32) -> EquipmentItem {
    harness
        .services
        .inventory
        .register(
            &admin(),
            CreateEquipment {
                name: name.to_string(),
                category: Some("mobility".to_string()),
                serial_number: None,
                total_quantity: total,
                notes: None,
            },
        )
        .await
        .unwrap()
}
