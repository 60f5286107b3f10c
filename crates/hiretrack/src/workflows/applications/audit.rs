use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use super::domain::{ApplicationId, ApplicationStatus, Role, UserId};

/// Transition waiting to be appended to the history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub application_id: ApplicationId,
    /// `None` only for the creation event.
    pub old_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub comment: String,
    pub role: Role,
    pub user_id: Option<UserId>,
}

impl AuditRecord {
    pub fn record(
        application_id: ApplicationId,
        old_status: Option<ApplicationStatus>,
        new_status: ApplicationStatus,
        comment: impl Into<String>,
        role: Role,
        user_id: Option<UserId>,
    ) -> Self {
        Self {
            application_id,
            old_status,
            new_status,
            comment: comment.into(),
            role,
            user_id,
        }
    }
}

/// Immutable history row as stored by the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub application_id: ApplicationId,
    #[serde(serialize_with = "serialize_old_status")]
    pub old_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub comment: String,
    pub updated_by_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by_user_id: Option<UserId>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn old_status_label(&self) -> &'static str {
        old_status_label(self.old_status)
    }
}

/// Sentinel written for the status before creation.
pub const NO_STATUS: &str = "None";

pub fn old_status_label(status: Option<ApplicationStatus>) -> &'static str {
    status.map_or(NO_STATUS, ApplicationStatus::label)
}

fn serialize_old_status<S>(status: &Option<ApplicationStatus>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(old_status_label(*status))
}

/// Reasons the log refuses an append.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit comment for application {0} is empty")]
    EmptyComment(ApplicationId),
    #[error(
        "history chain broken for application {application_id}: expected old status {expected}, got {found}"
    )]
    BrokenChain {
        application_id: ApplicationId,
        expected: &'static str,
        found: &'static str,
    },
}

/// Append-only history log.
///
/// Entries receive a sequence number and a timestamp strictly later than the previous
/// entry, so ordering by time never ties. An append is refused when its old status does
/// not continue the application's recorded lineage.
#[derive(Debug, Default, Clone)]
pub struct AuditLog {
    entries: Vec<HistoryEntry>,
    heads: HashMap<ApplicationId, ApplicationStatus>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `record` would be accepted without appending it.
    pub fn validate(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if record.comment.trim().is_empty() {
            return Err(AuditError::EmptyComment(record.application_id));
        }

        let head = self.heads.get(&record.application_id).copied();
        if head != record.old_status {
            return Err(AuditError::BrokenChain {
                application_id: record.application_id,
                expected: old_status_label(head),
                found: old_status_label(record.old_status),
            });
        }

        Ok(())
    }

    pub fn append(
        &mut self,
        record: AuditRecord,
        now: DateTime<Utc>,
    ) -> Result<HistoryEntry, AuditError> {
        self.validate(&record)?;

        let recorded_at = match self.entries.last() {
            Some(last) if now <= last.recorded_at => last.recorded_at + Duration::microseconds(1),
            _ => now,
        };

        let entry = HistoryEntry {
            sequence: self.entries.len() as u64 + 1,
            application_id: record.application_id,
            old_status: record.old_status,
            new_status: record.new_status,
            comment: record.comment,
            updated_by_role: record.role,
            updated_by_user_id: record.user_id,
            recorded_at,
        };

        self.heads.insert(entry.application_id, entry.new_status);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Entries for one application, newest first.
    pub fn for_application(&self, application_id: ApplicationId) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.application_id == application_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
