//! Reminder extraction, one-shot timers and the refresh daemon.
//!
//! Extraction is pure and recomputed from scratch on every call. Timers live in
//! a [`ReminderTimers`] arena keyed by schedule id; each entry carries a
//! generation number and a cancellation token. A timer task only invokes the
//! handler after atomically removing its own entry (same id, same generation),
//! so a cancelled or re-armed timer can never fire late.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use crate::{
    config::RemindersConfig,
    error::AppResult,
    models::{notification::ScheduleReminder, schedule::Schedule},
    repository::ScheduleStore,
};

/// Receives reminders when they come due
#[async_trait]
pub trait ReminderHandler: Send + Sync {
    async fn on_fire(&self, reminder: ScheduleReminder);
}

/// The reminder for `schedule`, if it is enabled, still scheduled and not yet past
pub fn extract_reminder(schedule: &Schedule, now: DateTime<Utc>) -> Option<ScheduleReminder> {
    ScheduleReminder::from_schedule(schedule, now)
}

/// Lazily extract reminders; calling again restarts from the first schedule
pub fn extract_reminders(
    schedules: &[Schedule],
    now: DateTime<Utc>,
) -> impl Iterator<Item = ScheduleReminder> + '_ {
    schedules.iter().filter_map(move |s| extract_reminder(s, now))
}

struct TimerEntry {
    generation: u64,
    token: CancellationToken,
    reminder: ScheduleReminder,
}

/// Outstanding one-shot timers, at most one per schedule id
#[derive(Clone, Default)]
pub struct ReminderTimers {
    entries: Arc<DashMap<i32, TimerEntry>>,
    generation: Arc<AtomicU64>,
}

impl ReminderTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, schedule_id: i32) -> bool {
        self.entries.contains_key(&schedule_id)
    }

    /// Reminders still waiting to fire, soonest first
    pub fn pending(&self) -> Vec<ScheduleReminder> {
        let mut pending: Vec<_> = self.entries.iter().map(|e| e.reminder.clone()).collect();
        pending.sort_by(|a, b| a.reminder_time.cmp(&b.reminder_time).then(a.schedule_id.cmp(&b.schedule_id)));
        pending
    }

    /// Register a timer for the reminder's schedule, cancelling any previous one
    fn arm(&self, reminder: &ScheduleReminder) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let entry = TimerEntry {
            generation,
            token: token.clone(),
            reminder: reminder.clone(),
        };
        if let Some(previous) = self.entries.insert(reminder.schedule_id, entry) {
            previous.token.cancel();
        }
        (generation, token)
    }

    /// Take ownership of the fire. Fails if the timer was cancelled or re-armed.
    fn claim(&self, schedule_id: i32, generation: u64) -> bool {
        self.entries
            .remove_if(&schedule_id, |_, entry| entry.generation == generation)
            .is_some()
    }

    /// Cancel the timer for one schedule; no-op when there is none
    pub fn cancel(&self, schedule_id: i32) -> bool {
        match self.entries.remove(&schedule_id) {
            Some((_, entry)) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel and forget every outstanding timer. Idempotent.
    pub fn cancel_all(&self) {
        self.entries.retain(|_, entry| {
            entry.token.cancel();
            false
        });
    }
}

/// Turns reminders into handler calls at their reminder time
#[derive(Clone)]
pub struct ReminderScheduler {
    clock: Arc<dyn Clock>,
    handler: Arc<dyn ReminderHandler>,
}

impl ReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>, handler: Arc<dyn ReminderHandler>) -> Self {
        Self { clock, handler }
    }

    /// Schedule every reminder into a fresh timer set
    pub async fn schedule_all<I>(&self, reminders: I) -> ReminderTimers
    where
        I: IntoIterator<Item = ScheduleReminder>,
    {
        let timers = ReminderTimers::new();
        self.schedule_into(&timers, reminders).await;
        timers
    }

    /// Schedule into an existing set. A reminder already due fires inline;
    /// others get a one-shot timer that replaces any timer for the same schedule.
    pub async fn schedule_into<I>(&self, timers: &ReminderTimers, reminders: I)
    where
        I: IntoIterator<Item = ScheduleReminder>,
    {
        let now = self.clock.now();

        for reminder in reminders {
            let schedule_id = reminder.schedule_id;

            if reminder.reminder_time <= now {
                timers.cancel(schedule_id);
                tracing::debug!(schedule_id, "Reminder already due, firing immediately");
                self.handler.on_fire(reminder).await;
                continue;
            }

            let delay = (reminder.reminder_time - now).to_std().unwrap_or_default();
            let (generation, token) = timers.arm(&reminder);
            let timers = timers.clone();
            let handler = self.handler.clone();

            tracing::debug!(
                schedule_id,
                reminder_time = %reminder.reminder_time,
                delay_secs = delay.as_secs(),
                "Reminder timer armed"
            );

            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }

                if timers.claim(schedule_id, generation) {
                    tracing::debug!(schedule_id, "Reminder timer fired");
                    handler.on_fire(reminder).await;
                }
            });
        }
    }
}

/// Remembers what already fired so a refresh does not fire it twice
struct FiredLog {
    inner: Arc<dyn ReminderHandler>,
    fired: DashMap<i32, DateTime<Utc>>,
}

impl FiredLog {
    fn already_fired(&self, reminder: &ScheduleReminder) -> bool {
        self.fired
            .get(&reminder.schedule_id)
            .is_some_and(|at| *at == reminder.reminder_time)
    }

    fn prune_before(&self, cutoff: DateTime<Utc>) {
        self.fired.retain(|_, at| *at >= cutoff);
    }
}

#[async_trait]
impl ReminderHandler for FiredLog {
    async fn on_fire(&self, reminder: ScheduleReminder) {
        self.fired.insert(reminder.schedule_id, reminder.reminder_time);
        self.inner.on_fire(reminder).await;
    }
}

/// Background daemon keeping the timer set in step with the schedule store
pub struct ReminderService {
    schedules: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    scheduler: ReminderScheduler,
    fired: Arc<FiredLog>,
    config: RemindersConfig,
    timers: Mutex<ReminderTimers>,
    refresh_requested: Notify,
}

impl ReminderService {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        clock: Arc<dyn Clock>,
        handler: Arc<dyn ReminderHandler>,
        config: RemindersConfig,
    ) -> Self {
        let fired = Arc::new(FiredLog {
            inner: handler,
            fired: DashMap::new(),
        });
        Self {
            schedules,
            scheduler: ReminderScheduler::new(clock.clone(), fired.clone()),
            clock,
            fired,
            config,
            timers: Mutex::new(ReminderTimers::new()),
            refresh_requested: Notify::new(),
        }
    }

    /// Replace the timer set with reminders for schedules starting inside the
    /// lookahead window. Returns the number of armed timers.
    pub async fn refresh(&self) -> AppResult<usize> {
        // Held from snapshot to re-arm: an older snapshot must never replace a newer one
        let mut timers = self.timers.lock().await;

        let now = self.clock.now();
        let until = now + Duration::hours(self.config.lookahead_hours);
        let schedules = self.schedules.list_between(now, Some(until)).await?;

        self.fired.prune_before(now - Duration::days(1));
        let reminders: Vec<_> = extract_reminders(&schedules, now)
            .filter(|r| !self.fired.already_fired(r))
            .collect();

        timers.cancel_all();
        *timers = self.scheduler.schedule_all(reminders).await;

        let armed = timers.len();
        tracing::info!(schedules = schedules.len(), armed, "Reminder timers refreshed");
        Ok(armed)
    }

    pub async fn pending(&self) -> Vec<ScheduleReminder> {
        self.timers.lock().await.pending()
    }

    /// Wake the daemon for an early refresh
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    pub async fn cancel_all(&self) {
        self.timers.lock().await.cancel_all();
    }

    /// Refresh on an interval (or on request) until `shutdown` is cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = std::time::Duration::from_secs(self.config.refresh_interval_secs.max(1));
        tracing::info!(interval_secs = interval.as_secs(), "Reminder service started");

        loop {
            if let Err(e) = self.refresh().await {
                tracing::error!("Failed to refresh reminders: {}", e);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
                _ = self.refresh_requested.notified() => {
                    tracing::debug!("Reminder refresh requested");
                }
            }
        }

        self.cancel_all().await;
        tracing::info!("Reminder service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::schedule::{CreateSchedule, ScheduleStatus, ScheduleType},
        repository::MemoryStore,
        services::clock::ManualClock,
    };
    use chrono::TimeZone;
    use tokio::{sync::mpsc, time::Instant};

    struct Recorder(mpsc::UnboundedSender<(i32, Instant)>);

    #[async_trait]
    impl ReminderHandler for Recorder {
        async fn on_fire(&self, reminder: ScheduleReminder) {
            let _ = self.0.send((reminder.schedule_id, Instant::now()));
        }
    }

    fn recorder() -> (Arc<Recorder>, mpsc::UnboundedReceiver<(i32, Instant)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder(tx)), rx)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn reminder(schedule_id: i32, reminder_time: DateTime<Utc>) -> ScheduleReminder {
        ScheduleReminder {
            schedule_id,
            title: format!("Visit {schedule_id}"),
            schedule_type: ScheduleType::Consultation,
            start_time: reminder_time + Duration::minutes(15),
            reminder_minutes: 15,
            location: None,
            reminder_time,
        }
    }

    fn schedule(id: i32, start: DateTime<Utc>, reminder_minutes: i32, status: ScheduleStatus) -> Schedule {
        Schedule {
            id,
            title: format!("Visit {id}"),
            schedule_type: ScheduleType::Delivery,
            client_id: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            status,
            reminder_minutes,
            location: None,
            participant_ids: Vec::new(),
            notes: None,
            crea_date: None,
            modif_date: None,
        }
    }

    async fn nothing_within(rx: &mut mpsc::UnboundedReceiver<(i32, Instant)>, secs: u64) -> bool {
        tokio::time::timeout(std::time::Duration::from_secs(secs), rx.recv())
            .await
            .is_err()
    }

    #[test]
    fn test_extraction_is_restartable() {
        let now = t0();
        let schedules = vec![
            schedule(1, now + Duration::hours(1), 30, ScheduleStatus::Scheduled),
            schedule(2, now + Duration::hours(1), 0, ScheduleStatus::Scheduled),
            schedule(3, now + Duration::hours(1), 30, ScheduleStatus::Cancelled),
            schedule(4, now + Duration::minutes(10), 30, ScheduleStatus::Scheduled),
        ];

        let first: Vec<_> = extract_reminders(&schedules, now).map(|r| r.schedule_id).collect();
        let second: Vec<_> = extract_reminders(&schedules, now).map(|r| r.schedule_id).collect();
        assert_eq!(first, vec![1]);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_at_reminder_time() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (handler, mut rx) = recorder();
        let scheduler = ReminderScheduler::new(clock, handler);

        let started = Instant::now();
        let timers = scheduler.schedule_all([reminder(7, t0() + Duration::minutes(10))]).await;
        assert!(timers.contains(7));

        let (id, at) = rx.recv().await.unwrap();
        assert_eq!(id, 7);
        assert_eq!(at - started, std::time::Duration::from_secs(600));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_reminder_fires_inline() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (handler, mut rx) = recorder();
        let scheduler = ReminderScheduler::new(clock, handler);

        let timers = scheduler.schedule_all([reminder(3, t0())]).await;
        assert!(timers.is_empty());
        assert_eq!(rx.try_recv().unwrap().0, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_prevents_fire() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (handler, mut rx) = recorder();
        let scheduler = ReminderScheduler::new(clock, handler);

        let timers = scheduler
            .schedule_all([
                reminder(1, t0() + Duration::minutes(5)),
                reminder(2, t0() + Duration::minutes(6)),
            ])
            .await;
        assert_eq!(timers.len(), 2);

        timers.cancel_all();
        timers.cancel_all();
        assert!(!timers.cancel(1));
        assert!(nothing_within(&mut rx, 3600).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_same_schedule_fires_once() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (handler, mut rx) = recorder();
        let scheduler = ReminderScheduler::new(clock, handler);

        let timers = scheduler.schedule_all([reminder(9, t0() + Duration::minutes(5))]).await;
        scheduler
            .schedule_into(&timers, [reminder(9, t0() + Duration::minutes(8))])
            .await;
        assert_eq!(timers.len(), 1);

        let started = Instant::now();
        let (id, at) = rx.recv().await.unwrap();
        assert_eq!(id, 9);
        assert_eq!(at - started, std::time::Duration::from_secs(480));
        assert!(nothing_within(&mut rx, 3600).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_timers_without_duplicates() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(t0()));
        let (handler, mut rx) = recorder();

        let created = <MemoryStore as ScheduleStore>::insert(
            &store,
            &CreateSchedule {
                title: "Power chair delivery".to_string(),
                schedule_type: ScheduleType::Delivery,
                client_id: Some(1),
                start_time: t0() + Duration::minutes(45),
                end_time: t0() + Duration::minutes(90),
                reminder_minutes: 30,
                location: None,
                participant_ids: vec![],
                notes: None,
            },
        )
        .await
        .unwrap();

        let service = ReminderService::new(
            Arc::new(store),
            clock.clone(),
            handler,
            RemindersConfig {
                enabled: true,
                refresh_interval_secs: 300,
                lookahead_hours: 48,
            },
        );

        assert_eq!(service.refresh().await.unwrap(), 1);
        assert_eq!(service.refresh().await.unwrap(), 1);
        assert_eq!(service.pending().await[0].schedule_id, created.id);

        let (id, _) = rx.recv().await.unwrap();
        assert_eq!(id, created.id);

        // Refreshing exactly at the fire instant must not fire again
        clock.advance(Duration::minutes(15));
        assert_eq!(service.refresh().await.unwrap(), 0);
        assert!(nothing_within(&mut rx, 3600).await);
    }

    /// Stalls the first `list_between` after its snapshot is taken
    struct StallingSchedules {
        inner: MemoryStore,
        gate: std::sync::Mutex<Option<(tokio::sync::oneshot::Sender<()>, tokio::sync::oneshot::Receiver<()>)>>,
    }

    #[async_trait]
    impl ScheduleStore for StallingSchedules {
        async fn get(&self, id: i32) -> AppResult<Schedule> {
            <MemoryStore as ScheduleStore>::get(&self.inner, id).await
        }

        async fn list_between(&self, from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> AppResult<Vec<Schedule>> {
            let snapshot = self.inner.list_between(from, until).await?;
            let gate = self.gate.lock().unwrap().take();
            if let Some((taken, release)) = gate {
                let _ = taken.send(());
                let _ = release.await;
            }
            Ok(snapshot)
        }

        async fn insert(&self, data: &CreateSchedule) -> AppResult<Schedule> {
            <MemoryStore as ScheduleStore>::insert(&self.inner, data).await
        }

        async fn update_status(
            &self,
            id: i32,
            expected: ScheduleStatus,
            target: ScheduleStatus,
        ) -> AppResult<Option<Schedule>> {
            <MemoryStore as ScheduleStore>::update_status(&self.inner, id, expected, target).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refreshes_keep_newest_snapshot() {
        let inner = MemoryStore::new();
        let created = <MemoryStore as ScheduleStore>::insert(
            &inner,
            &CreateSchedule {
                title: "Home visit".to_string(),
                schedule_type: ScheduleType::Consultation,
                client_id: Some(4),
                start_time: t0() + Duration::hours(2),
                end_time: t0() + Duration::hours(3),
                reminder_minutes: 30,
                location: None,
                participant_ids: vec![],
                notes: None,
            },
        )
        .await
        .unwrap();

        let (taken_tx, taken_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        let store = StallingSchedules {
            inner: inner.clone(),
            gate: std::sync::Mutex::new(Some((taken_tx, release_rx))),
        };

        let (handler, mut rx) = recorder();
        let service = Arc::new(ReminderService::new(
            Arc::new(store),
            Arc::new(ManualClock::new(t0())),
            handler,
            RemindersConfig {
                enabled: true,
                refresh_interval_secs: 300,
                lookahead_hours: 48,
            },
        ));

        // First refresh reads a snapshot with the schedule still open, then stalls
        let first = tokio::spawn({
            let service = service.clone();
            async move { service.refresh().await }
        });
        taken_rx.await.unwrap();

        <MemoryStore as ScheduleStore>::update_status(&inner, created.id, ScheduleStatus::Scheduled, ScheduleStatus::Cancelled)
            .await
            .unwrap()
            .unwrap();
        let second = tokio::spawn({
            let service = service.clone();
            async move { service.refresh().await }
        });
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert_eq!(second.await.unwrap().unwrap(), 0);

        assert!(service.pending().await.is_empty());
        assert!(nothing_within(&mut rx, 4 * 3600).await);
    }
}
