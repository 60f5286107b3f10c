//! Application intake, the status workflow and its audit trail.
//!
//! Technical applications move through `Submitted → Reviewed → Interview → Offer` under
//! the bot's control; non-technical applications are edited by people. Every accepted
//! change is committed together with an append-only history entry.

pub mod audit;
pub mod bot;
pub mod domain;
pub mod identity;
pub mod policy;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod transition;

#[cfg(test)]
mod tests;

pub use audit::{AuditError, AuditLog, AuditRecord, HistoryEntry};
pub use bot::{AdvanceResult, BatchSummary, BotProgressionEngine, ResetResult};
pub use domain::{
    Actor, Application, ApplicationId, ApplicationStatus, ApplicationSubmission, NewApplication,
    Role, StatusUpdate, Track, UserId,
};
pub use identity::{AuthError, Caller, IdentityProvider, StaticTokenIdentity};
pub use policy::{authorize, AccessMode, Operation, PolicyViolation};
pub use report::{BotStatusReport, DashboardSummary, StatusCount, WorkflowStatistics};
pub use repository::{ApplicationFilter, ApplicationRepository, RepositoryError, TransitionWrite};
pub use router::{application_router, ApiError, WorkflowState};
pub use service::ApplicationWorkflowService;
pub use store::InMemoryApplicationRepository;
pub use transition::{
    TerminalHandling, TransitionEngine, TransitionOutcome, TransitionRequest, WorkflowError,
};
