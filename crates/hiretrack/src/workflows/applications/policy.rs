//! Who may touch which application, and how.
//!
//! Technical applications belong to the automated pipeline; non-technical ones are
//! reviewed by people. The rules are expressed as a pure function so they can be
//! exercised without a store or a transport.

use serde::Serialize;

use super::domain::{Role, Track};

/// Operation a caller is attempting against a single application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    /// Status/comment change; `owns_application` is only consulted for applicants.
    Modify { owns_application: bool },
    /// Privileged force-return to `Submitted`.
    Reset,
}

/// Mode a permitted operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    /// Arbitrary status/comment edit by a person.
    FreeForm,
    /// Fixed next-status lookup driven by the bot.
    Sequenced,
    /// Unconditional reset.
    Privileged,
}

/// Reason an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("{role} may not modify {track} applications{}", track_hint(.role, .track))]
    TrackMismatch { role: Role, track: Track },
    #[error("applicants can only update their own applications")]
    NotOwner,
    #[error("{role} is not permitted to {action}")]
    Forbidden { role: Role, action: &'static str },
}

fn track_hint(role: &Role, track: &Track) -> &'static str {
    match (role, track) {
        (Role::Admin | Role::Applicant, Track::Technical) => {
            "; technical applications are updated automatically by BotMimic"
        }
        _ => "",
    }
}

/// Decide whether `role` may perform `operation` on an application of `track`.
pub fn authorize(
    role: Role,
    track: Track,
    operation: Operation,
) -> Result<AccessMode, PolicyViolation> {
    match operation {
        Operation::Read => Ok(AccessMode::ReadOnly),
        Operation::Reset => match role {
            Role::Admin | Role::BotMimic => Ok(AccessMode::Privileged),
            Role::Applicant => Err(PolicyViolation::Forbidden {
                role,
                action: "reset application status",
            }),
        },
        Operation::Modify { owns_application } => match (role, track) {
            (Role::Admin, Track::NonTechnical) => Ok(AccessMode::FreeForm),
            (Role::Applicant, _) if !owns_application => Err(PolicyViolation::NotOwner),
            (Role::Applicant, Track::NonTechnical) => Ok(AccessMode::FreeForm),
            (Role::BotMimic, Track::Technical) => Ok(AccessMode::Sequenced),
            (role, track) => Err(PolicyViolation::TrackMismatch { role, track }),
        },
    }
}

/// Coarse role membership used for reads and route gating.
pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), PolicyViolation> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(PolicyViolation::Forbidden {
            role,
            action: "access this resource",
        })
    }
}
