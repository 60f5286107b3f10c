use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::applications::audit::HistoryEntry;
use crate::workflows::applications::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, ApplicationSubmission, NewApplication,
    Role, StatusUpdate, UserId,
};
use crate::workflows::applications::identity::{Caller, StaticTokenIdentity};
use crate::workflows::applications::repository::{
    ApplicationFilter, ApplicationRepository, RepositoryError, TransitionWrite,
};
use crate::workflows::applications::{
    application_router, ApplicationWorkflowService, BotProgressionEngine,
    InMemoryApplicationRepository, WorkflowState,
};

pub(super) const ADMIN: UserId = UserId(1);
pub(super) const APPLICANT: UserId = UserId(2);
pub(super) const OTHER_APPLICANT: UserId = UserId(3);
pub(super) const BOT_USER: UserId = UserId(4);

pub(super) const ADMIN_TOKEN: &str = "admin-token";
pub(super) const APPLICANT_TOKEN: &str = "applicant-token";
pub(super) const OTHER_APPLICANT_TOKEN: &str = "other-applicant-token";
pub(super) const BOT_TOKEN: &str = "bot-token";

pub(super) fn identity() -> StaticTokenIdentity {
    StaticTokenIdentity::new()
        .with_token(
            ADMIN_TOKEN,
            Caller {
                user_id: ADMIN,
                role: Role::Admin,
            },
        )
        .with_token(
            APPLICANT_TOKEN,
            Caller {
                user_id: APPLICANT,
                role: Role::Applicant,
            },
        )
        .with_token(
            OTHER_APPLICANT_TOKEN,
            Caller {
                user_id: OTHER_APPLICANT,
                role: Role::Applicant,
            },
        )
        .with_token(
            BOT_TOKEN,
            Caller {
                user_id: BOT_USER,
                role: Role::BotMimic,
            },
        )
}

pub(super) fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        conflict_retries: 3,
    }
}

pub(super) fn submission(track: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        candidate_name: "Ada Lovelace".to_string(),
        track: track.to_string(),
        comments: Some("Referred by the analytics team".to_string()),
    }
}

pub(super) fn admin_update(status: &str) -> StatusUpdate {
    StatusUpdate::status(status).with_comments(format!("Moved to {status} after panel"))
}

pub(super) type Service<R> = ApplicationWorkflowService<R, StaticTokenIdentity>;

pub(super) fn build_workflow() -> (
    Service<InMemoryApplicationRepository>,
    BotProgressionEngine<InMemoryApplicationRepository>,
    Arc<InMemoryApplicationRepository>,
) {
    build_workflow_with(Arc::new(InMemoryApplicationRepository::default()))
}

pub(super) fn build_workflow_with<R>(repository: Arc<R>) -> (Service<R>, BotProgressionEngine<R>, Arc<R>)
where
    R: ApplicationRepository + 'static,
{
    let service = ApplicationWorkflowService::new(
        repository.clone(),
        Arc::new(identity()),
        &workflow_config(),
    );
    let bot = BotProgressionEngine::new(repository.clone(), &workflow_config());
    (service, bot, repository)
}

/// Submit an application owned by `APPLICANT` and force its status directly in the store.
pub(super) fn seed<R>(
    service: &Service<R>,
    repository: &R,
    track: &str,
    status: ApplicationStatus,
) -> Application
where
    R: ApplicationRepository + 'static,
{
    let application = service
        .submit(submission(track), APPLICANT)
        .expect("submission succeeds");
    force_status(repository, &application, status)
}

pub(super) fn force_status<R: ApplicationRepository>(
    repository: &R,
    application: &Application,
    status: ApplicationStatus,
) -> Application {
    let mut current = application.clone();
    let mut path = Vec::new();
    let mut cursor = ApplicationStatus::Submitted;
    while cursor != status {
        match (status, cursor.next_in_sequence()) {
            (ApplicationStatus::Rejected, _) | (_, None) => {
                path.push(status);
                break;
            }
            (_, Some(next)) => {
                path.push(next);
                cursor = next;
            }
        }
    }

    for next in path {
        let (updated, _) = repository
            .commit(TransitionWrite {
                expected_version: current.version,
                audit: crate::workflows::applications::AuditRecord::record(
                    current.id,
                    Some(current.status),
                    next,
                    "seeded",
                    Role::Admin,
                    Some(ADMIN),
                ),
                application: Application {
                    status: next,
                    ..current.clone()
                },
            })
            .expect("seed commit succeeds");
        current = updated;
    }
    current
}

pub(super) fn history_pairs(history: &[HistoryEntry]) -> Vec<(Option<ApplicationStatus>, ApplicationStatus)> {
    history
        .iter()
        .map(|entry| (entry.old_status, entry.new_status))
        .collect()
}

/// Delegates to the in-memory store but reports a conflict on the first `failures`
/// commits for each listed application.
pub(super) struct ContendedRepository {
    pub(super) inner: InMemoryApplicationRepository,
    contended: Mutex<HashSet<ApplicationId>>,
    failures: usize,
    attempts: AtomicUsize,
    seen: Mutex<Vec<ApplicationId>>,
}

impl ContendedRepository {
    pub(super) fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryApplicationRepository::default(),
            contended: Mutex::new(HashSet::new()),
            failures,
            attempts: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn contend(&self, id: ApplicationId) {
        self.contended.lock().expect("contended mutex poisoned").insert(id);
    }

    pub(super) fn commit_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ApplicationRepository for ContendedRepository {
    fn create(
        &self,
        application: NewApplication,
        actor: Actor,
        comment: &str,
    ) -> Result<(Application, HistoryEntry), RepositoryError> {
        self.inner.create(application, actor, comment)
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        self.inner.list(filter)
    }

    fn commit(&self, write: TransitionWrite) -> Result<(Application, HistoryEntry), RepositoryError> {
        let id = write.application.id;
        let contended = self
            .contended
            .lock()
            .expect("contended mutex poisoned")
            .contains(&id);

        if contended {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mut seen = self.seen.lock().expect("seen mutex poisoned");
            let failures_so_far = seen.iter().filter(|seen_id| **seen_id == id).count();
            if failures_so_far < self.failures {
                seen.push(id);
                return Err(RepositoryError::Conflict {
                    id,
                    expected: write.expected_version,
                    found: write.expected_version + 1,
                });
            }
        }

        self.inner.commit(write)
    }

    fn history(&self, id: ApplicationId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        self.inner.history(id)
    }
}

/// Delegates to the in-memory store but hides `vanished` ids from single fetches and
/// fails every commit for `broken` ids, while listings still include both.
#[derive(Default)]
pub(super) struct FaultyRepository {
    pub(super) inner: InMemoryApplicationRepository,
    vanished: Mutex<HashSet<ApplicationId>>,
    broken: Mutex<HashSet<ApplicationId>>,
}

impl FaultyRepository {
    pub(super) fn vanish(&self, id: ApplicationId) {
        self.vanished.lock().expect("vanished mutex poisoned").insert(id);
    }

    pub(super) fn break_commits(&self, id: ApplicationId) {
        self.broken.lock().expect("broken mutex poisoned").insert(id);
    }
}

impl ApplicationRepository for FaultyRepository {
    fn create(
        &self,
        application: NewApplication,
        actor: Actor,
        comment: &str,
    ) -> Result<(Application, HistoryEntry), RepositoryError> {
        self.inner.create(application, actor, comment)
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        if self.vanished.lock().expect("vanished mutex poisoned").contains(&id) {
            return Ok(None);
        }
        self.inner.fetch(id)
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        self.inner.list(filter)
    }

    fn commit(&self, write: TransitionWrite) -> Result<(Application, HistoryEntry), RepositoryError> {
        let id = write.application.id;
        if self.broken.lock().expect("broken mutex poisoned").contains(&id) {
            return Err(RepositoryError::Unavailable("write timed out".to_string()));
        }
        self.inner.commit(write)
    }

    fn history(&self, id: ApplicationId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        self.inner.history(id)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn create(
        &self,
        _application: NewApplication,
        _actor: Actor,
        _comment: &str,
    ) -> Result<(Application, HistoryEntry), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _write: TransitionWrite) -> Result<(Application, HistoryEntry), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history(&self, _id: ApplicationId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn application_router_with(
    service: Service<InMemoryApplicationRepository>,
    bot: BotProgressionEngine<InMemoryApplicationRepository>,
) -> axum::Router {
    application_router(WorkflowState {
        applications: Arc::new(service),
        bot: Arc::new(bot),
        identity: Arc::new(identity()),
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
