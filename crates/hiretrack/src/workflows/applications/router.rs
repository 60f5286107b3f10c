use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use super::audit::HistoryEntry;
use super::bot::{AdvanceResult, BatchSummary, BotProgressionEngine, ResetResult};
use super::domain::{Application, ApplicationId, ApplicationSubmission, Role, StatusUpdate, UserId};
use super::identity::{AuthError, Caller, IdentityProvider};
use super::policy::{require_role, PolicyViolation};
use super::report::{BotStatusReport, DashboardSummary, WorkflowStatistics};
use super::repository::{ApplicationFilter, ApplicationRepository};
use super::service::ApplicationWorkflowService;
use super::transition::WorkflowError;

const STAFF: &[Role] = &[Role::Admin, Role::BotMimic];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const APPLICANT_ONLY: &[Role] = &[Role::Applicant];

/// Shared handles for the application routes.
pub struct WorkflowState<R, I> {
    pub applications: Arc<ApplicationWorkflowService<R, I>>,
    pub bot: Arc<BotProgressionEngine<R>>,
    pub identity: Arc<I>,
}

impl<R, I> Clone for WorkflowState<R, I> {
    fn clone(&self) -> Self {
        Self {
            applications: self.applications.clone(),
            bot: self.bot.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// Router builder exposing submission, review, bot and history endpoints.
pub fn application_router<R, I>(state: WorkflowState<R, I>) -> Router
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, I>).get(list_handler::<R, I>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_handler::<R, I>).put(applicant_update_handler::<R, I>),
        )
        .route(
            "/api/v1/applications/:application_id/history",
            get(history_handler::<R, I>),
        )
        .route(
            "/api/v1/users/:user_id/applications",
            get(user_applications_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/applications/:application_id",
            put(admin_update_handler::<R, I>),
        )
        .route("/api/v1/admin/dashboard", get(dashboard_handler::<R, I>))
        .route("/api/v1/bot/update-all", post(advance_all_handler::<R, I>))
        .route(
            "/api/v1/bot/update/:application_id",
            post(advance_one_handler::<R, I>),
        )
        .route(
            "/api/v1/bot/reset/:application_id",
            post(reset_handler::<R, I>),
        )
        .route("/api/v1/bot/status", get(bot_status_handler::<R, I>))
        .route("/api/v1/bot/statistics", get(statistics_handler::<R, I>))
        .with_state(state)
}

/// Failure surfaced by an application route.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl From<PolicyViolation> for ApiError {
    fn from(value: PolicyViolation) -> Self {
        Self::Workflow(value.into())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Workflow(err) => match err {
                WorkflowError::ApplicationNotFound(_) | WorkflowError::UserNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                WorkflowError::TrackMismatch { .. } | WorkflowError::TerminalState { .. } => {
                    StatusCode::BAD_REQUEST
                }
                WorkflowError::NotOwner | WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
                WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                WorkflowError::Conflict(_) => StatusCode::CONFLICT,
                WorkflowError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable machine-readable discriminator for clients.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Auth(_) => "unauthenticated",
            ApiError::Workflow(err) => match err {
                WorkflowError::ApplicationNotFound(_) | WorkflowError::UserNotFound(_) => {
                    "not_found"
                }
                WorkflowError::TrackMismatch { .. } => "track_mismatch",
                WorkflowError::NotOwner => "not_owner",
                WorkflowError::Forbidden { .. } => "forbidden",
                WorkflowError::TerminalState { .. } => "terminal_state",
                WorkflowError::Validation(_) => "validation_error",
                WorkflowError::Conflict(_) => "conflict",
                WorkflowError::Persistence(_) => "persistence_error",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status_code(), Json(payload)).into_response()
    }
}

fn authenticate<I: IdentityProvider>(identity: &I, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;
    Ok(identity.authenticate(token)?)
}

fn authorize_roles<I: IdentityProvider>(
    identity: &I,
    headers: &HeaderMap,
    allowed: &[Role],
) -> Result<Caller, ApiError> {
    let caller = authenticate(identity, headers)?;
    require_role(caller.role, allowed)?;
    Ok(caller)
}

pub(crate) async fn submit_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Json(submission): Json<ApplicationSubmission>,
) -> Result<(StatusCode, Json<Application>), ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    let caller = authenticate(state.identity.as_ref(), &headers)?;
    let application = state.applications.submit(submission, caller.user_id)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn list_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Application>>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authorize_roles(state.identity.as_ref(), &headers, STAFF)?;
    Ok(Json(state.applications.list(&ApplicationFilter::all())?))
}

pub(crate) async fn get_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Result<Json<Application>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authenticate(state.identity.as_ref(), &headers)?;
    Ok(Json(state.applications.get(ApplicationId(application_id))?))
}

pub(crate) async fn applicant_update_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Application>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    let caller = authorize_roles(state.identity.as_ref(), &headers, APPLICANT_ONLY)?;
    let application = state.applications.update_as_applicant(
        ApplicationId(application_id),
        caller.user_id,
        update,
    )?;
    Ok(Json(application))
}

pub(crate) async fn history_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authenticate(state.identity.as_ref(), &headers)?;
    Ok(Json(state.applications.history(ApplicationId(application_id))?))
}

pub(crate) async fn user_applications_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(user_id): Path<u64>,
) -> Result<Json<Vec<Application>>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authenticate(state.identity.as_ref(), &headers)?;
    Ok(Json(state.applications.list_for_user(UserId(user_id))?))
}

pub(crate) async fn admin_update_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Application>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    let caller = authorize_roles(state.identity.as_ref(), &headers, ADMIN_ONLY)?;
    let application =
        state
            .applications
            .update_as_admin(ApplicationId(application_id), caller.user_id, update)?;
    Ok(Json(application))
}

pub(crate) async fn dashboard_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
) -> Result<Json<DashboardSummary>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authorize_roles(state.identity.as_ref(), &headers, ADMIN_ONLY)?;
    Ok(Json(state.applications.dashboard()?))
}

pub(crate) async fn advance_all_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
) -> Result<Json<BatchSummary>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    let caller = authorize_roles(state.identity.as_ref(), &headers, STAFF)?;
    Ok(Json(state.bot.advance_all_as(caller.actor())?))
}

pub(crate) async fn advance_one_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Result<Json<AdvanceResult>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    let caller = authorize_roles(state.identity.as_ref(), &headers, STAFF)?;
    Ok(Json(
        state
            .bot
            .advance_one_as(ApplicationId(application_id), caller.actor())?,
    ))
}

pub(crate) async fn reset_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Result<Json<ResetResult>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    let caller = authorize_roles(state.identity.as_ref(), &headers, STAFF)?;
    Ok(Json(
        state
            .bot
            .reset_as(ApplicationId(application_id), caller.actor())?,
    ))
}

pub(crate) async fn bot_status_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
) -> Result<Json<BotStatusReport>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authorize_roles(state.identity.as_ref(), &headers, STAFF)?;
    Ok(Json(state.bot.status()?))
}

pub(crate) async fn statistics_handler<R, I>(
    State(state): State<WorkflowState<R, I>>,
    headers: HeaderMap,
) -> Result<Json<WorkflowStatistics>, ApiError>
where
    R: ApplicationRepository + 'static,
    I: IdentityProvider + 'static,
{
    authorize_roles(state.identity.as_ref(), &headers, STAFF)?;
    Ok(Json(state.bot.statistics()?))
}
