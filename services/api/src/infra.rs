use hiretrack::config::WorkflowConfig;
use hiretrack::workflows::applications::{
    ApplicationWorkflowService, BotProgressionEngine, InMemoryApplicationRepository,
    StaticTokenIdentity, WorkflowState,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type InMemoryWorkflow =
    WorkflowState<InMemoryApplicationRepository, StaticTokenIdentity>;

/// Wire the service and bot engine over one shared repository so both see the same audit log.
pub(crate) fn in_memory_workflow(
    identity: StaticTokenIdentity,
    config: &WorkflowConfig,
) -> InMemoryWorkflow {
    let repository = Arc::new(InMemoryApplicationRepository::new());
    let identity = Arc::new(identity);
    let applications = Arc::new(ApplicationWorkflowService::new(
        repository.clone(),
        identity.clone(),
        config,
    ));
    let bot = Arc::new(BotProgressionEngine::new(repository, config));

    WorkflowState {
        applications,
        bot,
        identity,
    }
}
