//! Status transition engine.
//!
//! Every change runs as read, authorize, plan, commit. The commit carries the version
//! that was read; when another writer got there first the engine re-reads and plans
//! again, up to the configured number of attempts.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::audit::{AuditRecord, HistoryEntry};
use super::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, Role, StatusUpdate, Track, UserId,
};
use super::policy::{self, AccessMode, Operation, PolicyViolation};
use super::repository::{ApplicationRepository, RepositoryError, TransitionWrite};

pub const DEFAULT_CONFLICT_RETRIES: u8 = 3;

/// Comment logged when a human edit carries none.
pub const DEFAULT_EDIT_COMMENT: &str = "Status updated";
pub const RESET_COMMENT: &str = "Bot Mimic: Status reset to Submitted";

/// How the sequenced path treats an application that has nowhere left to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalHandling {
    /// Report `TerminalState` (single-item requests).
    Reject,
    /// Leave the application untouched (batch runs).
    Skip,
}

/// Change requested of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRequest {
    Edit(StatusUpdate),
    Advance(TerminalHandling),
    Reset,
}

impl TransitionRequest {
    fn operation(&self, actor: &Actor, application: &Application) -> Operation {
        match self {
            TransitionRequest::Edit(_) | TransitionRequest::Advance(_) => Operation::Modify {
                owns_application: actor.user_id == Some(application.owner_id),
            },
            TransitionRequest::Reset => Operation::Reset,
        }
    }

    /// Role the policy evaluates. Sequenced steps always run as the bot, whoever
    /// triggered them; the audit entry still names the triggering actor.
    fn acting_role(&self, actor: &Actor) -> Role {
        match self {
            TransitionRequest::Advance(_) => Role::BotMimic,
            TransitionRequest::Edit(_) | TransitionRequest::Reset => actor.role,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            TransitionRequest::Edit(_) => "edit application status",
            TransitionRequest::Advance(_) => "advance application status",
            TransitionRequest::Reset => "reset application status",
        }
    }
}

/// New state computed for an application before it is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
    pub status: ApplicationStatus,
    pub comments: Option<String>,
    /// Provenance comment written to the history log.
    pub note: String,
}

/// Result of a request that passed policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        application: Application,
        entry: HistoryEntry,
        previous: ApplicationStatus,
    },
    Unchanged(Application),
}

impl TransitionOutcome {
    pub fn application(&self) -> &Application {
        match self {
            TransitionOutcome::Applied { application, .. } => application,
            TransitionOutcome::Unchanged(application) => application,
        }
    }

    pub fn into_application(self) -> Application {
        match self {
            TransitionOutcome::Applied { application, .. } => application,
            TransitionOutcome::Unchanged(application) => application,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Plan a free-form human edit. Blank fields are left as they are.
pub fn plan_edit(
    application: &Application,
    update: &StatusUpdate,
) -> Result<PlannedTransition, WorkflowError> {
    let status = match update.supplied_status() {
        Some(raw) => raw
            .parse::<ApplicationStatus>()
            .map_err(|err| WorkflowError::Validation(err.to_string()))?,
        None => application.status,
    };

    if application.status.is_terminal() && status != application.status {
        return Err(WorkflowError::TerminalState {
            id: application.id,
            status: application.status,
        });
    }

    let supplied_comments = update.supplied_comments().map(str::to_string);
    let note = supplied_comments
        .clone()
        .unwrap_or_else(|| DEFAULT_EDIT_COMMENT.to_string());

    Ok(PlannedTransition {
        status,
        comments: supplied_comments.or_else(|| application.comments.clone()),
        note,
    })
}

/// Plan the bot's next step; `None` when the batch path should leave it alone.
pub fn plan_advance(
    application: &Application,
    terminal: TerminalHandling,
) -> Result<Option<PlannedTransition>, WorkflowError> {
    match (application.status.next_in_sequence(), terminal) {
        (Some(next), _) => {
            let note = format!(
                "Bot Mimic: Auto-updated from {} to {}",
                application.status, next
            );
            Ok(Some(PlannedTransition {
                status: next,
                comments: Some(note.clone()),
                note,
            }))
        }
        (None, TerminalHandling::Skip) => Ok(None),
        (None, TerminalHandling::Reject) => Err(WorkflowError::TerminalState {
            id: application.id,
            status: application.status,
        }),
    }
}

/// Plan the unconditional return to `Submitted`.
pub fn plan_reset(_application: &Application) -> PlannedTransition {
    PlannedTransition {
        status: ApplicationStatus::Submitted,
        comments: Some(RESET_COMMENT.to_string()),
        note: RESET_COMMENT.to_string(),
    }
}

/// Applies transitions to one application at a time against a repository.
pub struct TransitionEngine<R> {
    repository: Arc<R>,
    max_attempts: u8,
}

impl<R> TransitionEngine<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_retries(repository, DEFAULT_CONFLICT_RETRIES)
    }

    pub fn with_retries(repository: Arc<R>, max_attempts: u8) -> Self {
        Self {
            repository,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn apply(
        &self,
        id: ApplicationId,
        actor: Actor,
        request: &TransitionRequest,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let mut attempt = 1;
        loop {
            let application = self
                .repository
                .fetch(id)?
                .ok_or(WorkflowError::ApplicationNotFound(id))?;

            let mode = policy::authorize(
                request.acting_role(&actor),
                application.track,
                request.operation(&actor, &application),
            )?;

            let planned = match (request, mode) {
                (TransitionRequest::Edit(update), AccessMode::FreeForm) => {
                    Some(plan_edit(&application, update)?)
                }
                (TransitionRequest::Advance(terminal), AccessMode::Sequenced) => {
                    plan_advance(&application, *terminal)?
                }
                (TransitionRequest::Reset, AccessMode::Privileged) => {
                    Some(plan_reset(&application))
                }
                _ => {
                    return Err(WorkflowError::Forbidden {
                        role: actor.role,
                        action: request.action(),
                    })
                }
            };

            let Some(planned) = planned else {
                return Ok(TransitionOutcome::Unchanged(application));
            };

            let previous = application.status;
            let write = TransitionWrite {
                expected_version: application.version,
                audit: AuditRecord::record(
                    id,
                    Some(previous),
                    planned.status,
                    planned.note,
                    actor.role,
                    actor.user_id,
                ),
                application: Application {
                    status: planned.status,
                    comments: planned.comments,
                    updated_at: Utc::now(),
                    ..application
                },
            };

            match self.repository.commit(write) {
                Ok((application, entry)) => {
                    debug!(
                        application_id = %id,
                        role = %actor.role,
                        from = %previous,
                        to = %application.status,
                        "transition committed"
                    );
                    return Ok(TransitionOutcome::Applied {
                        application,
                        entry,
                        previous,
                    });
                }
                Err(RepositoryError::Conflict { .. }) if attempt < self.max_attempts => {
                    debug!(application_id = %id, attempt, "version conflict, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Error raised by the workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("{role} may not modify {track} applications")]
    TrackMismatch { role: Role, track: Track },
    #[error("applicants can only update their own applications")]
    NotOwner,
    #[error("{role} is not permitted to {action}")]
    Forbidden { role: Role, action: &'static str },
    #[error("application {id} is already in final status {status}")]
    TerminalState {
        id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("application {0} was modified concurrently")]
    Conflict(ApplicationId),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl WorkflowError {
    /// Errors a batch run may skip past.
    pub fn is_item_recoverable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Conflict(_) | WorkflowError::ApplicationNotFound(_)
        )
    }
}

impl From<PolicyViolation> for WorkflowError {
    fn from(value: PolicyViolation) -> Self {
        match value {
            PolicyViolation::TrackMismatch { role, track } => Self::TrackMismatch { role, track },
            PolicyViolation::NotOwner => Self::NotOwner,
            PolicyViolation::Forbidden { role, action } => Self::Forbidden { role, action },
        }
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { id, .. } => Self::Conflict(id),
            RepositoryError::NotFound(id) => Self::ApplicationNotFound(id),
            RepositoryError::Audit(err) => Self::Persistence(err.to_string()),
            RepositoryError::Unavailable(reason) => Self::Persistence(reason),
        }
    }
}
