//! Reminders and the notifications derived from them

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::schedule::{Schedule, ScheduleStatus, ScheduleType};

/// A pending reminder derived from a schedule. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScheduleReminder {
    pub schedule_id: i32,
    pub title: String,
    pub schedule_type: ScheduleType,
    pub start_time: DateTime<Utc>,
    pub reminder_minutes: i32,
    pub location: Option<String>,
    /// `start_time - reminder_minutes`
    pub reminder_time: DateTime<Utc>,
}

impl ScheduleReminder {
    /// Derive the reminder for `schedule`, if one is still due at `now`
    pub fn from_schedule(schedule: &Schedule, now: DateTime<Utc>) -> Option<Self> {
        if schedule.reminder_minutes <= 0 || schedule.status != ScheduleStatus::Scheduled {
            return None;
        }

        let reminder_time = schedule.start_time - Duration::minutes(i64::from(schedule.reminder_minutes));
        if reminder_time < now {
            return None;
        }

        Some(Self {
            schedule_id: schedule.id,
            title: schedule.title.clone(),
            schedule_type: schedule.schedule_type,
            start_time: schedule.start_time,
            reminder_minutes: schedule.reminder_minutes,
            location: schedule.location.clone(),
            reminder_time,
        })
    }
}

/// Delivery permission as granted by the recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPermission {
    Granted,
    Denied,
    Undetermined,
}

/// Kind of delivery channel, matched against the per-channel switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Push,
    Email,
}

/// Recipient-level notification settings
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub push_notifications: bool,
    pub email_notifications: bool,
    pub permission: DeliveryPermission,
}

impl NotificationSettings {
    pub fn channel_enabled(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Push => self.push_notifications,
            ChannelKind::Email => self.email_notifications,
        }
    }
}

impl From<&crate::config::NotificationsConfig> for NotificationSettings {
    fn from(config: &crate::config::NotificationsConfig) -> Self {
        Self {
            enabled: config.enabled,
            push_notifications: config.push_notifications,
            email_notifications: config.email_notifications,
            permission: config.permission,
        }
    }
}

/// Payload handed to a delivery channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Dedup tag: repeated fires for one schedule collapse on it
    pub tag: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub auto_dismiss_secs: u64,
}

/// Dedup tag for a schedule
pub fn schedule_tag(schedule_id: i32) -> String {
    format!("schedule-{}", schedule_id)
}

/// What the dispatcher did with a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Disabled,
    ChannelDisabled,
    PermissionNotGranted,
    Failed,
}
