use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for stored applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for users known to the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification fixed at submission that decides who may move the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Track {
    #[serde(rename = "technical")]
    Technical,
    #[serde(rename = "non-technical")]
    NonTechnical,
}

impl Track {
    pub const ALL: [Track; 2] = [Track::Technical, Track::NonTechnical];

    pub const fn label(self) -> &'static str {
        match self {
            Track::Technical => "technical",
            Track::NonTechnical => "non-technical",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Track {
    type Err = UnknownLabel;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(Track::Technical),
            "non-technical" => Ok(Track::NonTechnical),
            _ => Err(UnknownLabel {
                kind: "track",
                value: raw.to_string(),
            }),
        }
    }
}

/// Pipeline status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Submitted,
    Reviewed,
    Interview,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::Reviewed,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::Reviewed => "Reviewed",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    /// `Offer` and `Rejected` accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Offer | ApplicationStatus::Rejected)
    }

    /// Fixed successor used by the automated pipeline.
    pub const fn next_in_sequence(self) -> Option<ApplicationStatus> {
        match self {
            ApplicationStatus::Submitted => Some(ApplicationStatus::Reviewed),
            ApplicationStatus::Reviewed => Some(ApplicationStatus::Interview),
            ApplicationStatus::Interview => Some(ApplicationStatus::Offer),
            ApplicationStatus::Offer | ApplicationStatus::Rejected => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownLabel;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownLabel {
                kind: "status",
                value: raw.to_string(),
            })
    }
}

/// Label that did not match any known track or status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Closed set of actors recognised by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Applicant,
    BotMimic,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Applicant => "Applicant",
            Role::BotMimic => "BotMimic",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = UnknownLabel;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "applicant" => Ok(Role::Applicant),
            "botmimic" => Ok(Role::BotMimic),
            _ => Err(UnknownLabel {
                kind: "role",
                value: raw.to_string(),
            }),
        }
    }
}

/// Who is performing an operation, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub user_id: Option<UserId>,
}

impl Actor {
    pub const BOT: Actor = Actor {
        role: Role::BotMimic,
        user_id: None,
    };

    pub const fn admin(user_id: UserId) -> Self {
        Self {
            role: Role::Admin,
            user_id: Some(user_id),
        }
    }

    pub const fn applicant(user_id: UserId) -> Self {
        Self {
            role: Role::Applicant,
            user_id: Some(user_id),
        }
    }
}

/// Stored application as seen by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_name: String,
    pub track: Track,
    pub status: ApplicationStatus,
    pub comments: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by the store on every committed write.
    pub version: u64,
}

/// Payload an applicant provides when applying.
///
/// The track stays a raw string until validation so that casing such as
/// `Technical` or `NON-TECHNICAL` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub candidate_name: String,
    pub track: String,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Validated submission ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub candidate_name: String,
    pub track: Track,
    pub status: ApplicationStatus,
    pub comments: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Free-form edit requested by a human actor. Blank fields count as omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl StatusUpdate {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            comments: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub(crate) fn supplied_status(&self) -> Option<&str> {
        non_blank(self.status.as_deref())
    }

    pub(crate) fn supplied_comments(&self) -> Option<&str> {
        non_blank(self.comments.as_deref())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
