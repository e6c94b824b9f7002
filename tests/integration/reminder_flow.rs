//! Schedule store -> reminder timers -> dispatcher -> channel

use std::sync::Arc;

use async_trait::async_trait;
use caseworks_server::{
    config::AppConfig,
    error::AppResult,
    models::{
        notification::{ChannelKind, Notification},
        schedule::{CreateSchedule, Schedule, ScheduleStatus, ScheduleType},
    },
    services::{self, notifications::DeliveryChannel, reminders::ReminderService},
};
use chrono::Duration;
use tokio::{sync::mpsc, time::Instant};

use crate::common::{harness, t0, therapist, Harness};

struct RecordingChannel(mpsc::UnboundedSender<(Notification, Instant)>);

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        let _ = self.0.send((notification.clone(), Instant::now()));
        Ok(())
    }
}

type Deliveries = mpsc::UnboundedReceiver<(Notification, Instant)>;

fn reminders(h: &Harness, config: &AppConfig) -> (Arc<ReminderService>, Deliveries) {
    let (tx, rx) = mpsc::unbounded_channel();
    let service = services::reminder_service(
        &h.repository,
        Arc::new(RecordingChannel(tx)),
        h.audit.clone(),
        h.clock.clone(),
        config,
    );
    (service, rx)
}

async fn assessment(h: &Harness, starts_in: Duration, reminder_minutes: i32) -> Schedule {
    h.services
        .schedules
        .create(
            &therapist(),
            CreateSchedule {
                title: "Seating assessment".to_string(),
                schedule_type: ScheduleType::Assessment,
                client_id: Some(31),
                start_time: t0() + starts_in,
                end_time: t0() + starts_in + Duration::hours(1),
                reminder_minutes,
                location: Some("Room 3".to_string()),
                participant_ids: vec![2],
                notes: None,
            },
        )
        .await
        .unwrap()
}

async fn quiet_for(rx: &mut Deliveries, secs: u64) -> bool {
    tokio::time::timeout(std::time::Duration::from_secs(secs), rx.recv())
        .await
        .is_err()
}

#[tokio::test(start_paused = true)]
async fn test_reminder_delivered_at_lead_time() {
    let h = harness();
    let schedule = assessment(&h, Duration::minutes(45), 30).await;
    let (service, mut rx) = reminders(&h, &AppConfig::default());

    let started = Instant::now();
    assert_eq!(service.refresh().await.unwrap(), 1);
    assert_eq!(service.pending().await[0].schedule_id, schedule.id);

    let (notification, at) = rx.recv().await.unwrap();
    assert_eq!(at - started, std::time::Duration::from_secs(15 * 60));
    assert_eq!(notification.title, "Seating assessment");
    assert_eq!(notification.body, "Assessment starts in 30 minute(s) at Room 3");
    assert_eq!(notification.tag, format!("schedule-{}", schedule.id));
    assert_eq!(notification.url, format!("http://localhost:3000/schedules/{}", schedule.id));
    assert_eq!(notification.auto_dismiss_secs, 10);
    assert!(service.pending().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_never_duplicates() {
    let h = harness();
    assessment(&h, Duration::minutes(45), 30).await;
    let (service, mut rx) = reminders(&h, &AppConfig::default());

    service.refresh().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    service.refresh().await.unwrap();
    service.refresh().await.unwrap();

    assert!(rx.recv().await.is_some());
    // Same wall-clock instant: the reminder is still extractable, but already fired
    assert_eq!(service.refresh().await.unwrap(), 0);
    assert!(quiet_for(&mut rx, 3600).await);
}

#[tokio::test(start_paused = true)]
async fn test_closed_schedule_drops_its_timer() {
    let h = harness();
    let schedule = assessment(&h, Duration::hours(2), 30).await;
    let (service, mut rx) = reminders(&h, &AppConfig::default());

    assert_eq!(service.refresh().await.unwrap(), 1);
    h.services
        .schedules
        .update_status(&therapist(), schedule.id, ScheduleStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(service.refresh().await.unwrap(), 0);

    assert!(quiet_for(&mut rx, 3 * 3600).await);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_notifications_reach_no_channel() {
    let h = harness();
    assessment(&h, Duration::minutes(20), 10).await;

    let mut config = AppConfig::default();
    config.notifications.enabled = false;
    let (service, mut rx) = reminders(&h, &config);

    assert_eq!(service.refresh().await.unwrap(), 1);
    assert!(quiet_for(&mut rx, 3600).await);
}

#[tokio::test(start_paused = true)]
async fn test_daemon_stops_on_shutdown() {
    let h = harness();
    assessment(&h, Duration::minutes(45), 30).await;
    let (service, mut rx) = reminders(&h, &AppConfig::default());

    let shutdown = tokio_util::sync::CancellationToken::new();
    let daemon = tokio::spawn(service.clone().run(shutdown.clone()));

    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(service.pending().await.len(), 1);

    shutdown.cancel();
    daemon.await.unwrap();
    assert!(service.pending().await.is_empty());
    assert!(quiet_for(&mut rx, 3600).await);
}
