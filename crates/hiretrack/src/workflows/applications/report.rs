use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Application, ApplicationStatus, Track};

/// Count of applications sharing a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub count: usize,
}

/// Status counts in pipeline order, omitting empty statuses.
pub fn status_breakdown<'a>(applications: impl IntoIterator<Item = &'a Application>) -> Vec<StatusCount> {
    let mut counts: BTreeMap<ApplicationStatus, usize> = BTreeMap::new();
    for application in applications {
        *counts.entry(application.status).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

/// Snapshot of the automated pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotStatusReport {
    pub total_technical_applications: usize,
    pub pending_updates: usize,
    pub status_breakdown: Vec<StatusCount>,
    pub generated_at: DateTime<Utc>,
}

impl BotStatusReport {
    pub fn from_applications(technical: &[Application]) -> Self {
        Self {
            total_technical_applications: technical.len(),
            pending_updates: technical
                .iter()
                .filter(|application| !application.status.is_terminal())
                .count(),
            status_breakdown: status_breakdown(technical),
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackStatistics {
    pub total: usize,
    pub breakdown: Vec<StatusCount>,
}

/// Per-track breakdown across every stored application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStatistics {
    pub technical_applications: TrackStatistics,
    pub non_technical_applications: TrackStatistics,
    pub overall_total: usize,
}

impl WorkflowStatistics {
    pub fn from_applications(applications: &[Application]) -> Self {
        let for_track = |track: Track| {
            let matching: Vec<&Application> = applications
                .iter()
                .filter(|application| application.track == track)
                .collect();
            TrackStatistics {
                total: matching.len(),
                breakdown: status_breakdown(matching),
            }
        };

        Self {
            technical_applications: for_track(Track::Technical),
            non_technical_applications: for_track(Track::NonTechnical),
            overall_total: applications.len(),
        }
    }
}

/// Headline counts for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_applications: usize,
    pub technical_applications: usize,
    pub non_technical_applications: usize,
    pub pending_applications: usize,
}

impl DashboardSummary {
    pub fn from_applications(applications: &[Application]) -> Self {
        let on_track = |track: Track| {
            applications
                .iter()
                .filter(|application| application.track == track)
                .count()
        };

        Self {
            total_applications: applications.len(),
            technical_applications: on_track(Track::Technical),
            non_technical_applications: on_track(Track::NonTechnical),
            pending_applications: applications
                .iter()
                .filter(|application| application.status == ApplicationStatus::Submitted)
                .count(),
        }
    }
}
