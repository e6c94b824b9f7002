//! Caseworks
//!
//! Workflow server for assistive-technology providers: an equipment inventory
//! ledger, rental lifecycle, custom fabrication stages and appointment
//! reminders, exposed as a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    /// Present when the reminder daemon runs in this process
    pub reminders: Option<Arc<services::reminders::ReminderService>>,
}
