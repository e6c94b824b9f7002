//! Customization stage machine and its append-only history

use std::sync::Arc;

use serde_json::json;
use validator::Validate;

use super::{audit::AuditSink, clock::Clock};
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::AuditEntry,
        customization::{
            describe_transition, CreateCustomization, CustomizationRequest, CustomizationStage,
            NewCustomization, NewStageHistoryEntry, StageHistoryEntry, TransitionOutcome,
            TransitionStage,
        },
        role::{ActorContext, Operation},
    },
    repository::Repository,
};

/// Error for a transition whose compare-and-set lost to a concurrent change
fn lost_race_error(current: &CustomizationRequest, to: CustomizationStage) -> AppError {
    if current.status.is_terminal() {
        AppError::TerminalState {
            entity: "customization",
            state: current.status.to_string(),
        }
    } else if !current.status.can_transition_to(to) {
        AppError::illegal_transition("customization", current.status, to, current.status.allowed_next())
    } else {
        AppError::Conflict(format!(
            "Customization request {} changed stage concurrently",
            current.id
        ))
    }
}

#[derive(Clone)]
pub struct CustomizationsService {
    repository: Repository,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl CustomizationsService {
    pub fn new(repository: Repository, audit: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            audit,
            clock,
        }
    }

    pub async fn get(&self, ctx: &ActorContext, id: i32) -> AppResult<CustomizationRequest> {
        ctx.require(Operation::ViewCustomizations)?;
        self.repository.customizations.get(id).await
    }

    /// Stage history, oldest first
    pub async fn history(&self, ctx: &ActorContext, id: i32) -> AppResult<Vec<StageHistoryEntry>> {
        ctx.require(Operation::ViewCustomizations)?;
        self.repository.customizations.get(id).await?;
        self.repository.customizations.history(id).await
    }

    /// Intake a request at `requested`
    pub async fn create(&self, ctx: &ActorContext, data: CreateCustomization) -> AppResult<CustomizationRequest> {
        ctx.require(Operation::CreateCustomization)?;
        data.validate()?;

        let request = self
            .repository
            .customizations
            .insert(&NewCustomization {
                client_id: data.client_id,
                title: data.title,
                description: data.description,
                requested_date: data.requested_date.unwrap_or_else(|| self.clock.today()),
            })
            .await?;

        tracing::info!(request_id = request.id, client_id = request.client_id, "Customization requested");
        self.audit.record(
            "customization.created",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({ "id": request.id, "after": { "status": request.status } }),
            )
            .tag("customization"),
        );
        Ok(request)
    }

    /// Move a request along one edge of the stage graph
    pub async fn transition_stage(
        &self,
        ctx: &ActorContext,
        id: i32,
        data: TransitionStage,
    ) -> AppResult<TransitionOutcome> {
        ctx.require(Operation::TransitionCustomization)?;
        self.apply(ctx, id, data).await
    }

    /// Deletion is a forced move to `cancelled`; history is kept
    pub async fn cancel(
        &self,
        ctx: &ActorContext,
        id: i32,
        notes: Option<String>,
    ) -> AppResult<TransitionOutcome> {
        ctx.require(Operation::CancelCustomization)?;
        let mut data = TransitionStage::to(CustomizationStage::Cancelled);
        data.notes = notes;
        self.apply(ctx, id, data).await
    }

    async fn apply(&self, ctx: &ActorContext, id: i32, data: TransitionStage) -> AppResult<TransitionOutcome> {
        let current = self.repository.customizations.get(id).await?;
        let from = current.status;
        let to = data.target_stage;

        if from.is_terminal() {
            return Err(AppError::TerminalState {
                entity: "customization",
                state: from.to_string(),
            });
        }
        if !from.can_transition_to(to) {
            return Err(AppError::illegal_transition("customization", from, to, from.allowed_next()));
        }

        let stage_date = data.stage_date.unwrap_or_else(|| self.clock.today());
        let completed_date = (to == CustomizationStage::Completed).then_some(stage_date);

        let request = match self
            .repository
            .customizations
            .update_stage(id, from, to, completed_date)
            .await?
        {
            Some(request) => request,
            None => {
                // Another caller moved it between our read and the update
                let current = self.repository.customizations.get(id).await?;
                tracing::warn!(request_id = id, expected = %from, status = %current.status, "Customization stage changed concurrently");
                return Err(lost_race_error(&current, to));
            }
        };

        let notes = data
            .notes
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| describe_transition(from, to));
        let entry = NewStageHistoryEntry {
            request_id: id,
            stage: to,
            notes,
            metadata: data.metadata.unwrap_or_default(),
            attachments: data.attachments.unwrap_or_default(),
            stage_date,
            changed_by: Some(ctx.actor_id),
        };

        // The stage change stands even if the history append fails
        let history_entry = match self.repository.customizations.append_history(&entry).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(request_id = id, stage = %to, "Failed to append stage history: {}", e);
                None
            }
        };

        tracing::info!(request_id = id, from = %from, to = %to, "Customization stage changed");
        self.audit.record(
            "customization.stage_changed",
            AuditEntry::new(
                Some(ctx.actor_id),
                json!({
                    "id": id,
                    "before": { "status": from },
                    "after": { "status": to, "completed_date": request.completed_date },
                    "history_recorded": history_entry.is_some(),
                }),
            )
            .tag("customization"),
        );

        Ok(TransitionOutcome { request, history_entry })
    }
}
