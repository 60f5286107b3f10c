use super::audit::{AuditError, AuditRecord, HistoryEntry};
use super::domain::{Actor, Application, ApplicationId, NewApplication, Track, UserId};

/// Query used by listing and batch selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub track: Option<Track>,
    pub owner_id: Option<UserId>,
    pub exclude_terminal: bool,
}

impl ApplicationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn track(track: Track) -> Self {
        Self {
            track: Some(track),
            ..Self::default()
        }
    }

    pub fn owned_by(owner_id: UserId) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Self::default()
        }
    }

    pub fn non_terminal(mut self) -> Self {
        self.exclude_terminal = true;
        self
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.track.map_or(true, |track| application.track == track)
            && self
                .owner_id
                .map_or(true, |owner| application.owner_id == owner)
            && !(self.exclude_terminal && application.status.is_terminal())
    }
}

/// Application mutation plus the history record that must land with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionWrite {
    /// Version observed when the transition was planned.
    pub expected_version: u64,
    pub application: Application,
    pub audit: AuditRecord,
}

/// Storage abstraction so the workflow can be exercised in isolation.
///
/// `create` and `commit` are units of work: the application write and the history
/// append either both land or neither does.
pub trait ApplicationRepository: Send + Sync {
    /// Assigns the id and logs the creation event (old status `None`) for `actor`.
    fn create(
        &self,
        application: NewApplication,
        actor: Actor,
        comment: &str,
    ) -> Result<(Application, HistoryEntry), RepositoryError>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Matching applications ordered by id.
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError>;
    /// Fails with `Conflict` when the stored version differs from `expected_version`.
    fn commit(&self, write: TransitionWrite) -> Result<(Application, HistoryEntry), RepositoryError>;
    /// History for one application, newest first.
    fn history(&self, id: ApplicationId) -> Result<Vec<HistoryEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("application {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        id: ApplicationId,
        expected: u64,
        found: u64,
    },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("audit append rejected: {0}")]
    Audit(#[from] AuditError),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
