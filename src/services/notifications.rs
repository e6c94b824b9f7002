//! Notification dispatcher and delivery channels

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{
    audit::AuditSink, clock::Clock, email::EmailService, redis::RedisService,
    reminders::ReminderHandler,
};
use crate::{
    config::NotificationsConfig,
    error::AppResult,
    models::{
        audit::AuditEntry,
        notification::{
            schedule_tag, ChannelKind, DeliveryPermission, DispatchOutcome, Notification,
            NotificationSettings, ScheduleReminder,
        },
    },
};

/// Where notifications end up
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn deliver(&self, notification: &Notification) -> AppResult<()>;
}

/// Push stand-in: writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChannel;

#[async_trait]
impl DeliveryChannel for TracingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        tracing::info!(
            target: "notifications",
            tag = %notification.tag,
            url = %notification.url,
            auto_dismiss_secs = notification.auto_dismiss_secs,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// SMTP delivery; with Redis configured, a tag is mailed at most once per TTL
#[derive(Clone)]
pub struct EmailChannel {
    email: EmailService,
    to: String,
    redis: Option<RedisService>,
    dedup_ttl_secs: u64,
}

impl EmailChannel {
    pub fn new(email: EmailService, to: String, redis: Option<RedisService>, dedup_ttl_secs: u64) -> Self {
        Self {
            email,
            to,
            redis,
            dedup_ttl_secs,
        }
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        if let Some(redis) = &self.redis {
            if !redis.claim_tag(&notification.tag, self.dedup_ttl_secs).await? {
                tracing::debug!(tag = %notification.tag, "Notification already mailed, skipping");
                return Ok(());
            }
        }

        let sent = self.email.send_notification(&self.to, notification).await;
        if sent.is_err() {
            if let Some(redis) = &self.redis {
                if let Err(e) = redis.release_tag(&notification.tag).await {
                    tracing::warn!(tag = %notification.tag, "Failed to release notification tag: {}", e);
                }
            }
        }
        sent
    }
}

/// Settings-gated forwarding of fired reminders to one channel.
///
/// Never retries and never fails: a delivery error is logged and audited.
pub struct NotificationDispatcher {
    settings: NotificationSettings,
    channel: Arc<dyn DeliveryChannel>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    auto_dismiss_secs: u64,
    base_url: String,
}

impl NotificationDispatcher {
    pub fn new(
        settings: NotificationSettings,
        channel: Arc<dyn DeliveryChannel>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            channel,
            audit,
            clock,
            auto_dismiss_secs: 10,
            base_url: String::new(),
        }
    }

    pub fn from_config(
        config: &NotificationsConfig,
        channel: Arc<dyn DeliveryChannel>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auto_dismiss_secs: config.auto_dismiss_secs,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..Self::new(NotificationSettings::from(config), channel, audit, clock)
        }
    }

    /// Build the payload for a reminder
    pub fn notification_for(&self, reminder: &ScheduleReminder) -> Notification {
        let mut body = format!(
            "{} starts in {} minute(s)",
            capitalize(reminder.schedule_type.as_str()),
            reminder.reminder_minutes
        );
        if let Some(location) = reminder.location.as_deref().filter(|l| !l.is_empty()) {
            body.push_str(&format!(" at {}", location));
        }

        Notification {
            title: reminder.title.clone(),
            body,
            tag: schedule_tag(reminder.schedule_id),
            url: format!("{}/schedules/{}", self.base_url, reminder.schedule_id),
            timestamp: self.clock.now(),
            auto_dismiss_secs: self.auto_dismiss_secs,
        }
    }

    pub async fn dispatch(&self, reminder: &ScheduleReminder) -> DispatchOutcome {
        let schedule_id = reminder.schedule_id;

        if !self.settings.enabled {
            tracing::debug!(schedule_id, "Notifications disabled, dropping reminder");
            return DispatchOutcome::Disabled;
        }
        if !self.settings.channel_enabled(self.channel.kind()) {
            tracing::debug!(schedule_id, channel = ?self.channel.kind(), "Channel disabled, dropping reminder");
            return DispatchOutcome::ChannelDisabled;
        }
        if self.settings.permission != DeliveryPermission::Granted {
            tracing::debug!(schedule_id, permission = ?self.settings.permission, "Delivery not permitted");
            return DispatchOutcome::PermissionNotGranted;
        }

        let notification = self.notification_for(reminder);
        match self.channel.deliver(&notification).await {
            Ok(()) => {
                tracing::info!(schedule_id, tag = %notification.tag, "Reminder delivered");
                DispatchOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(schedule_id, tag = %notification.tag, "Reminder delivery failed: {}", e);
                self.audit.record(
                    "notification.delivery_failed",
                    AuditEntry::new(
                        None,
                        json!({
                            "schedule_id": schedule_id,
                            "tag": notification.tag,
                            "channel": format!("{:?}", self.channel.kind()),
                            "error": e.to_string(),
                        }),
                    )
                    .tag("notification"),
                );
                DispatchOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl ReminderHandler for NotificationDispatcher {
    async fn on_fire(&self, reminder: ScheduleReminder) {
        self.dispatch(&reminder).await;
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
