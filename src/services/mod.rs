//! Business logic services

pub mod audit;
pub mod clock;
pub mod customizations;
pub mod email;
pub mod inventory;
pub mod notifications;
pub mod redis;
pub mod reminders;
pub mod rentals;
pub mod schedules;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

use self::{
    audit::AuditSink,
    clock::Clock,
    notifications::{DeliveryChannel, EmailChannel, NotificationDispatcher, TracingChannel},
    reminders::ReminderService,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub inventory: inventory::InventoryService,
    pub rentals: rentals::RentalsService,
    pub customizations: customizations::CustomizationsService,
    pub schedules: schedules::SchedulesService,
}

impl Services {
    /// Create all domain services over the given repository
    pub fn new(
        repository: Repository,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        Self {
            inventory: inventory::InventoryService::new(repository.clone(), audit.clone()),
            rentals: rentals::RentalsService::new(
                repository.clone(),
                audit.clone(),
                clock.clone(),
                config.rentals.clone(),
            ),
            customizations: customizations::CustomizationsService::new(
                repository.clone(),
                audit.clone(),
                clock.clone(),
            ),
            schedules: schedules::SchedulesService::new(repository, audit, clock),
        }
    }
}

/// Delivery channel selected by `notifications.channel`
pub async fn delivery_channel(config: &AppConfig) -> AppResult<Arc<dyn DeliveryChannel>> {
    use crate::config::ChannelSelection;

    match config.notifications.channel {
        ChannelSelection::Log => Ok(Arc::new(TracingChannel)),
        ChannelSelection::Email => {
            let to = config.notifications.email_to.clone().ok_or_else(|| {
                AppError::Internal("notifications.email_to is required for the email channel".to_string())
            })?;
            let redis = if config.redis.enabled {
                Some(redis::RedisService::new(&config.redis.url).await?)
            } else {
                None
            };
            Ok(Arc::new(EmailChannel::new(
                email::EmailService::new(config.email.clone()),
                to,
                redis,
                config.notifications.dedup_ttl_secs,
            )))
        }
    }
}

/// Wire the reminder daemon: schedule store, scheduler and dispatcher
pub fn reminder_service(
    repository: &Repository,
    channel: Arc<dyn DeliveryChannel>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: &AppConfig,
) -> Arc<ReminderService> {
    let dispatcher = NotificationDispatcher::from_config(&config.notifications, channel, audit, clock.clone());
    Arc::new(ReminderService::new(
        repository.schedules.clone(),
        clock,
        Arc::new(dispatcher),
        config.reminders.clone(),
    ))
}
