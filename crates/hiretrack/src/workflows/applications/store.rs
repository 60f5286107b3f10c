use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::audit::{AuditLog, AuditRecord, HistoryEntry};
use super::domain::{Actor, Application, ApplicationId, NewApplication};
use super::repository::{ApplicationFilter, ApplicationRepository, RepositoryError, TransitionWrite};

#[derive(Debug, Default)]
struct Tables {
    applications: BTreeMap<ApplicationId, Application>,
    history: AuditLog,
    next_id: u64,
}

/// Process-local store: applications and their history share one lock so every
/// commit is atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryApplicationRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    /// Number of history rows across all applications.
    pub fn history_len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.history.len())
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn create(
        &self,
        application: NewApplication,
        actor: Actor,
        comment: &str,
    ) -> Result<(Application, HistoryEntry), RepositoryError> {
        let mut tables = self.lock()?;
        let id = ApplicationId(tables.next_id + 1);

        let entry = tables.history.append(
            AuditRecord::record(
                id,
                None,
                application.status,
                comment,
                actor.role,
                actor.user_id,
            ),
            Utc::now(),
        )?;

        let stored = Application {
            id,
            candidate_name: application.candidate_name,
            track: application.track,
            status: application.status,
            comments: application.comments,
            owner_id: application.owner_id,
            created_at: application.created_at,
            updated_at: application.created_at,
            version: 1,
        };

        tables.next_id = id.0;
        tables.applications.insert(id, stored.clone());
        Ok((stored, entry))
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect())
    }

    fn commit(&self, write: TransitionWrite) -> Result<(Application, HistoryEntry), RepositoryError> {
        let TransitionWrite {
            expected_version,
            application,
            audit,
        } = write;

        let mut tables = self.lock()?;
        let current = tables
            .applications
            .get(&application.id)
            .ok_or(RepositoryError::NotFound(application.id))?;

        if current.version != expected_version {
            return Err(RepositoryError::Conflict {
                id: application.id,
                expected: expected_version,
                found: current.version,
            });
        }

        // Identity, ownership and track never change after creation.
        let updated = Application {
            id: current.id,
            candidate_name: current.candidate_name.clone(),
            track: current.track,
            owner_id: current.owner_id,
            created_at: current.created_at,
            status: application.status,
            comments: application.comments,
            updated_at: application.updated_at,
            version: current.version + 1,
        };

        let entry = tables.history.append(audit, Utc::now())?;
        tables.applications.insert(updated.id, updated.clone());
        Ok((updated, entry))
    }

    fn history(&self, id: ApplicationId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let tables = self.lock()?;
        if !tables.applications.contains_key(&id) {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(tables.history.for_application(id))
    }
}
