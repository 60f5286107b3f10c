use std::sync::Arc;
use std::thread;

use hiretrack::config::WorkflowConfig;
use hiretrack::workflows::applications::{
    ApplicationStatus, ApplicationSubmission, ApplicationWorkflowService, BotProgressionEngine,
    Caller, HistoryEntry, InMemoryApplicationRepository, Role, StaticTokenIdentity, StatusUpdate,
    UserId, WorkflowError,
};

const ADMIN: UserId = UserId(10);
const APPLICANT: UserId = UserId(20);

type Service = ApplicationWorkflowService<InMemoryApplicationRepository, StaticTokenIdentity>;
type Bot = BotProgressionEngine<InMemoryApplicationRepository>;

fn workflow() -> (Arc<Service>, Arc<Bot>) {
    let repository = Arc::new(InMemoryApplicationRepository::new());
    let identity = StaticTokenIdentity::new()
        .with_token(
            "admin",
            Caller {
                user_id: ADMIN,
                role: Role::Admin,
            },
        )
        .with_token(
            "applicant",
            Caller {
                user_id: APPLICANT,
                role: Role::Applicant,
            },
        );
    let config = WorkflowConfig::default();
    let service = ApplicationWorkflowService::new(repository.clone(), Arc::new(identity), &config);
    let bot = BotProgressionEngine::new(repository, &config);
    (Arc::new(service), Arc::new(bot))
}

fn apply(track: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        candidate_name: "Linus Example".to_string(),
        track: track.to_string(),
        comments: None,
    }
}

/// Newest-first history must be strictly descending in time and chain back to `None`.
fn assert_unbroken_lineage(history: &[HistoryEntry], current: ApplicationStatus) {
    assert!(!history.is_empty(), "history should never be empty");
    assert_eq!(history[0].new_status, current);

    for pair in history.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        assert!(newer.recorded_at > older.recorded_at, "timestamps must strictly descend");
        assert!(newer.sequence > older.sequence);
        assert_eq!(newer.old_status, Some(older.new_status), "chain broken");
    }

    let origin = history.last().expect("non-empty");
    assert_eq!(origin.old_status, None);
    assert_eq!(origin.new_status, ApplicationStatus::Submitted);
}

#[test]
fn technical_application_runs_the_full_bot_pipeline() {
    let (service, bot) = workflow();
    let application = service
        .submit(apply("technical"), APPLICANT)
        .expect("submission succeeds");

    for expected in [
        ApplicationStatus::Reviewed,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
    ] {
        let result = bot.advance_one(application.id).expect("advance");
        assert_eq!(result.new_status, expected);
    }
    assert!(matches!(
        bot.advance_one(application.id),
        Err(WorkflowError::TerminalState {
            status: ApplicationStatus::Offer,
            ..
        })
    ));

    let history = service.history(application.id).expect("history");
    assert_eq!(history.len(), 4);
    assert!(history[..3]
        .iter()
        .all(|entry| entry.updated_by_role == Role::BotMimic));
    assert_unbroken_lineage(&history, ApplicationStatus::Offer);
}

#[test]
fn mixed_human_and_bot_activity_keeps_an_unbroken_lineage() {
    let (service, bot) = workflow();
    let human = service
        .submit(apply("non-technical"), APPLICANT)
        .expect("submission succeeds");
    let technical = service
        .submit(apply("TECHNICAL"), APPLICANT)
        .expect("submission succeeds");

    service
        .update_as_applicant(
            human.id,
            APPLICANT,
            StatusUpdate::default().with_comments("Uploaded certificate"),
        )
        .expect("owner edit");
    service
        .update_as_admin(human.id, ADMIN, StatusUpdate::status("Interview"))
        .expect("admin edit");
    bot.advance_all().expect("batch");
    bot.reset(technical.id).expect("reset");
    bot.advance_all().expect("batch");
    service
        .update_as_admin(human.id, ADMIN, StatusUpdate::status("Rejected"))
        .expect("admin rejects");

    let human_history = service.history(human.id).expect("history");
    assert_eq!(human_history.len(), 4);
    assert_unbroken_lineage(&human_history, ApplicationStatus::Rejected);

    let technical_history = service.history(technical.id).expect("history");
    assert_eq!(technical_history.len(), 4);
    assert_unbroken_lineage(&technical_history, ApplicationStatus::Reviewed);
}

#[test]
fn concurrent_bot_advances_never_skip_or_duplicate_steps() {
    let (service, bot) = workflow();
    let application = service
        .submit(apply("technical"), APPLICANT)
        .expect("submission succeeds");

    let results: Vec<Result<_, WorkflowError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bot = bot.clone();
                scope.spawn(move || bot.advance_one(application.id))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    let applied = results.iter().filter(|result| result.is_ok()).count();
    assert!(applied <= 3, "at most three steps exist");
    for result in &results {
        match result {
            Ok(_) => {}
            Err(WorkflowError::TerminalState { .. }) | Err(WorkflowError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    let stored = service.get(application.id).expect("stored");
    let history = service.history(application.id).expect("history");
    assert_eq!(history.len(), applied + 1);
    assert_unbroken_lineage(&history, stored.status);
}
