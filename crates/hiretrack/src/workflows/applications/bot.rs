use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Actor, ApplicationId, ApplicationStatus, Role, Track};
use super::policy::require_role;
use super::repository::{ApplicationFilter, ApplicationRepository};
use super::report::{BotStatusReport, WorkflowStatistics};
use super::transition::{
    TerminalHandling, TransitionEngine, TransitionOutcome, TransitionRequest, WorkflowError,
};
use crate::config::WorkflowConfig;

/// Roles allowed to drive the pipeline or trigger it by hand.
const OPERATORS: &[Role] = &[Role::Admin, Role::BotMimic];

/// Totals reported by a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub updated_count: usize,
    pub total_processed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdvanceResult {
    pub application_id: ApplicationId,
    pub old_status: ApplicationStatus,
    pub new_status: ApplicationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetResult {
    pub application_id: ApplicationId,
    pub new_status: ApplicationStatus,
}

/// Drives technical applications through the fixed pipeline as `BotMimic`.
pub struct BotProgressionEngine<R> {
    repository: Arc<R>,
    engine: TransitionEngine<R>,
}

impl<R> BotProgressionEngine<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: &WorkflowConfig) -> Self {
        let engine = TransitionEngine::with_retries(repository.clone(), config.conflict_retries);
        Self { repository, engine }
    }

    /// Advance every non-terminal technical application by one step.
    ///
    /// Conflicts and vanished applications are skipped; any other failure stops the run.
    pub fn advance_all(&self) -> Result<BatchSummary, WorkflowError> {
        self.advance_all_as(Actor::BOT)
    }

    /// Batch run triggered by `actor`, who is recorded on every history entry.
    pub fn advance_all_as(&self, actor: Actor) -> Result<BatchSummary, WorkflowError> {
        require_role(actor.role, OPERATORS)?;
        let eligible = self
            .repository
            .list(&ApplicationFilter::track(Track::Technical).non_terminal())?;

        let request = TransitionRequest::Advance(TerminalHandling::Skip);
        let mut updated_count = 0;

        for application in &eligible {
            match self.engine.apply(application.id, actor, &request) {
                Ok(TransitionOutcome::Applied { .. }) => updated_count += 1,
                Ok(TransitionOutcome::Unchanged(_)) => {}
                Err(err) if err.is_item_recoverable() => {
                    warn!(application_id = %application.id, error = %err, "skipping application in batch");
                }
                Err(err) => return Err(err),
            }
        }

        let summary = BatchSummary {
            updated_count,
            total_processed: eligible.len(),
        };
        info!(
            role = %actor.role,
            updated = summary.updated_count,
            processed = summary.total_processed,
            "technical applications advanced"
        );
        Ok(summary)
    }

    /// Advance one technical application, rejecting terminal ones.
    pub fn advance_one(&self, id: ApplicationId) -> Result<AdvanceResult, WorkflowError> {
        self.advance_one_as(id, Actor::BOT)
    }

    pub fn advance_one_as(
        &self,
        id: ApplicationId,
        actor: Actor,
    ) -> Result<AdvanceResult, WorkflowError> {
        require_role(actor.role, OPERATORS)?;
        let request = TransitionRequest::Advance(TerminalHandling::Reject);
        match self.engine.apply(id, actor, &request)? {
            TransitionOutcome::Applied {
                application,
                previous,
                ..
            } => Ok(AdvanceResult {
                application_id: id,
                old_status: previous,
                new_status: application.status,
            }),
            // A rejecting request never plans a no-op.
            TransitionOutcome::Unchanged(application) => Err(WorkflowError::TerminalState {
                id,
                status: application.status,
            }),
        }
    }

    /// Force the application back to `Submitted`, whatever its track or status.
    pub fn reset(&self, id: ApplicationId) -> Result<ResetResult, WorkflowError> {
        self.reset_as(id, Actor::BOT)
    }

    pub fn reset_as(&self, id: ApplicationId, actor: Actor) -> Result<ResetResult, WorkflowError> {
        let outcome = self.engine.apply(id, actor, &TransitionRequest::Reset)?;
        info!(application_id = %id, role = %actor.role, "application status reset");
        Ok(ResetResult {
            application_id: id,
            new_status: outcome.application().status,
        })
    }

    pub fn status(&self) -> Result<BotStatusReport, WorkflowError> {
        let technical = self
            .repository
            .list(&ApplicationFilter::track(Track::Technical))?;
        Ok(BotStatusReport::from_applications(&technical))
    }

    pub fn statistics(&self) -> Result<WorkflowStatistics, WorkflowError> {
        let all = self.repository.list(&ApplicationFilter::all())?;
        Ok(WorkflowStatistics::from_applications(&all))
    }
}
