use crate::infra::{in_memory_workflow, InMemoryWorkflow};
use clap::Args;
use hiretrack::config::WorkflowConfig;
use hiretrack::error::AppError;
use hiretrack::workflows::applications::{
    Application, ApplicationSubmission, Caller, Role, StaticTokenIdentity, StatusUpdate, UserId,
};

const DEMO_ADMIN: UserId = UserId(1);
const DEMO_APPLICANT: UserId = UserId(2);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Candidate name used for both sample applications.
    #[arg(long, default_value = "Ada Lovelace")]
    pub(crate) candidate: String,
    /// Reset the technical application to Submitted after the bot finishes.
    #[arg(long)]
    pub(crate) reset: bool,
    /// Print each history entry as JSON instead of a one-line summary.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let workflow = in_memory_workflow(demo_identity(), &WorkflowConfig::default());
    let DemoArgs {
        candidate,
        reset,
        json,
    } = args;

    println!("HireTrack workflow demo");
    println!("=======================");

    let technical = workflow
        .applications
        .submit(demo_submission(&candidate, "technical"), DEMO_APPLICANT)?;
    let human = workflow
        .applications
        .submit(demo_submission(&candidate, "non-technical"), DEMO_APPLICANT)?;
    println!(
        "Submitted #{} (technical) and #{} (non-technical) for {}",
        technical.id, human.id, candidate
    );

    println!("\nBot progression");
    loop {
        let summary = workflow.bot.advance_all()?;
        println!(
            "  batch: {} of {} eligible applications advanced",
            summary.updated_count, summary.total_processed
        );
        if summary.total_processed == 0 {
            break;
        }
    }
    if reset {
        let result = workflow.bot.reset(technical.id)?;
        println!(
            "  reset #{} to {}",
            result.application_id, result.new_status
        );
    }

    println!("\nHuman review");
    workflow.applications.update_as_applicant(
        human.id,
        DEMO_APPLICANT,
        StatusUpdate::default().with_comments("Attached portfolio link"),
    )?;
    workflow.applications.update_as_admin(
        human.id,
        DEMO_ADMIN,
        StatusUpdate::status("Interview").with_comments("Strong writing sample"),
    )?;
    let decided = workflow.applications.update_as_admin(
        human.id,
        DEMO_ADMIN,
        StatusUpdate::status("Offer").with_comments("Panel approved"),
    )?;
    println!("  #{} is now {}", decided.id, decided.status);

    render_history(&workflow, &workflow.applications.get(technical.id)?, json)?;
    render_history(&workflow, &decided, json)?;

    let dashboard = workflow.applications.dashboard()?;
    println!(
        "\nDashboard: {} total, {} technical, {} non-technical, {} pending",
        dashboard.total_applications,
        dashboard.technical_applications,
        dashboard.non_technical_applications,
        dashboard.pending_applications
    );

    Ok(())
}

fn render_history(
    workflow: &InMemoryWorkflow,
    application: &Application,
    json: bool,
) -> Result<(), AppError> {
    println!(
        "\nHistory for #{} ({}, currently {})",
        application.id,
        application.track.label(),
        application.status
    );
    for entry in workflow.applications.history(application.id)?.iter().rev() {
        if json {
            match serde_json::to_string(entry) {
                Ok(payload) => println!("  {}", payload),
                Err(err) => println!("  entry {} unavailable: {}", entry.sequence, err),
            }
            continue;
        }
        let actor = match entry.updated_by_user_id {
            Some(user_id) => format!("{} #{}", entry.updated_by_role, user_id),
            None => entry.updated_by_role.to_string(),
        };
        println!(
            "  {} {:>9} -> {:<9} by {:<12} {}",
            entry.recorded_at.format("%H:%M:%S%.6f"),
            entry.old_status_label(),
            entry.new_status.label(),
            actor,
            entry.comment
        );
    }
    Ok(())
}

fn demo_identity() -> StaticTokenIdentity {
    StaticTokenIdentity::new()
        .with_token(
            "demo-admin",
            Caller {
                user_id: DEMO_ADMIN,
                role: Role::Admin,
            },
        )
        .with_token(
            "demo-applicant",
            Caller {
                user_id: DEMO_APPLICANT,
                role: Role::Applicant,
            },
        )
}

fn demo_submission(candidate: &str, track: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        candidate_name: candidate.to_string(),
        track: track.to_string(),
        comments: Some("Submitted through the demo".to_string()),
    }
}
