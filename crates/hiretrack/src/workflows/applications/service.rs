use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::audit::HistoryEntry;
use super::domain::{
    non_blank, Actor, Application, ApplicationId, ApplicationStatus, ApplicationSubmission,
    NewApplication, StatusUpdate, Track, UserId,
};
use super::identity::IdentityProvider;
use super::report::DashboardSummary;
use super::repository::{ApplicationFilter, ApplicationRepository};
use super::transition::{TransitionEngine, TransitionRequest, WorkflowError};
use crate::config::WorkflowConfig;

pub const CREATION_COMMENT: &str = "Application created";

/// Human-facing operations: submission, free-form edits and reads.
pub struct ApplicationWorkflowService<R, I> {
    repository: Arc<R>,
    identity: Arc<I>,
    engine: TransitionEngine<R>,
}

impl<R, I> ApplicationWorkflowService<R, I>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(repository: Arc<R>, identity: Arc<I>, config: &WorkflowConfig) -> Self {
        let engine = TransitionEngine::with_retries(repository.clone(), config.conflict_retries);
        Self {
            repository,
            identity,
            engine,
        }
    }

    /// Create an application owned by `owner_id` in status `Submitted`.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
        owner_id: UserId,
    ) -> Result<Application, WorkflowError> {
        let candidate_name = non_blank(Some(submission.candidate_name.as_str()))
            .ok_or_else(|| WorkflowError::Validation("candidate name is required".to_string()))?
            .to_string();
        let track = submission
            .track
            .parse::<Track>()
            .map_err(|err| WorkflowError::Validation(err.to_string()))?;

        if !self.identity.user_exists(owner_id) {
            return Err(WorkflowError::UserNotFound(owner_id));
        }

        let draft = NewApplication {
            candidate_name,
            track,
            status: ApplicationStatus::Submitted,
            comments: non_blank(submission.comments.as_deref()).map(str::to_string),
            owner_id,
            created_at: Utc::now(),
        };

        let (application, _) =
            self.repository
                .create(draft, Actor::applicant(owner_id), CREATION_COMMENT)?;
        info!(application_id = %application.id, %track, owner = %owner_id, "application submitted");
        Ok(application)
    }

    /// Free-form edit by an admin; only non-technical applications qualify.
    pub fn update_as_admin(
        &self,
        id: ApplicationId,
        caller_id: UserId,
        update: StatusUpdate,
    ) -> Result<Application, WorkflowError> {
        self.edit(id, Actor::admin(caller_id), update)
    }

    /// Free-form edit by the owning applicant; only non-technical applications qualify.
    pub fn update_as_applicant(
        &self,
        id: ApplicationId,
        caller_id: UserId,
        update: StatusUpdate,
    ) -> Result<Application, WorkflowError> {
        self.edit(id, Actor::applicant(caller_id), update)
    }

    fn edit(
        &self,
        id: ApplicationId,
        actor: Actor,
        update: StatusUpdate,
    ) -> Result<Application, WorkflowError> {
        let outcome = self
            .engine
            .apply(id, actor, &TransitionRequest::Edit(update))?;
        Ok(outcome.into_application())
    }

    pub fn get(&self, id: ApplicationId) -> Result<Application, WorkflowError> {
        self.repository
            .fetch(id)?
            .ok_or(WorkflowError::ApplicationNotFound(id))
    }

    pub fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, WorkflowError> {
        Ok(self.repository.list(filter)?)
    }

    pub fn list_for_user(&self, user_id: UserId) -> Result<Vec<Application>, WorkflowError> {
        if !self.identity.user_exists(user_id) {
            return Err(WorkflowError::UserNotFound(user_id));
        }
        self.list(&ApplicationFilter::owned_by(user_id))
    }

    /// Transition log for one application, most recent first.
    pub fn history(&self, id: ApplicationId) -> Result<Vec<HistoryEntry>, WorkflowError> {
        Ok(self.repository.history(id)?)
    }

    pub fn dashboard(&self) -> Result<DashboardSummary, WorkflowError> {
        let all = self.repository.list(&ApplicationFilter::all())?;
        Ok(DashboardSummary::from_applications(&all))
    }
}
