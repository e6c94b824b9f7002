//! Appointment schedules

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use validator::Validate;

use super::{audit::AuditSink, clock::Clock};
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::AuditEntry,
        role::{ActorContext, Operation},
        schedule::{CreateSchedule, Schedule, ScheduleStatus},
    },
    repository::Repository,
};

/// Statuses a scheduled appointment can be closed with
const CLOSING_STATUSES: [ScheduleStatus; 3] = [
    ScheduleStatus::Completed,
    ScheduleStatus::Cancelled,
    ScheduleStatus::NoShow,
];

#[derive(Clone)]
pub struct SchedulesService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl SchedulesService {
    pub fn new(repository: Repository, audit: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            audit,
            clock,
        }
    }

    pub async fn get(&self, ctx: &ActorContext, id: i32) -> AppResult<Schedule> {
        ctx.require(Operation::ViewSchedules)?;
        self.repository.schedules.get(id).await
    }

    /// Schedules starting in `[from, until)`; `from` defaults to now
    pub async fn list(
        &self,
        ctx: &ActorContext,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Schedule>> {
        ctx.require(Operation::ViewSchedules)?;
        let from = from.unwrap_or_else(|| self.clock.now());
        if matches!(until, Some(until) if until <= from) {
            return Err(AppError::Validation("'until' must be after 'from'".to_string()));
        }
        self.repository.schedules.list_between(from, until).await
    }

    pub async fn create(&self, ctx: &ActorContext, data: CreateSchedule) -> AppResult<Schedule> {
        ctx.require(Operation::ManageSchedules)?;
        data.validate()?;

        let schedule = self.repository.schedules.insert(&data).await?;
        tracing::info!(
            schedule_id = schedule.id,
            start_time = %schedule.start_time,
            reminder_minutes = schedule.reminder_minutes,
            "Schedule created"
        );
        self.audit.record(
            "schedule.created",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({ "id": schedule.id, "after": { "status": schedule.status, "start_time": schedule.start_time } }),
            )
            .tag("schedule"),
        );
        Ok(schedule)
    }

    /// Close a scheduled appointment as completed, cancelled or no-show
    pub async fn update_status(&self, ctx: &ActorContext, id: i32, status: ScheduleStatus) -> AppResult<Schedule> {
        ctx.require(Operation::ManageSchedules)?;

        let current = self.repository.schedules.get(id).await?;
        if current.status.is_terminal() {
            return Err(AppError::TerminalState {
                entity: "schedule",
                state: current.status.to_string(),
            });
        }
        if !CLOSING_STATUSES.contains(&status) {
            return Err(AppError::illegal_transition(
                "schedule",
                current.status,
                status,
                &CLOSING_STATUSES,
            ));
        }

        let updated = self
            .repository
            .schedules
            .update_status(id, current.status, status)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("Schedule {} changed concurrently", id)))?;

        tracing::info!(schedule_id = id, from = %current.status, to = %updated.status, "Schedule status changed");
        self.audit.record(
            "schedule.status_changed",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({ "id": id, "before": { "status": current.status }, "after": { "status": updated.status } }),
            )
            .tag("schedule"),
        );
        Ok(updated)
    }
}
