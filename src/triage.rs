use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::ai::JobTriage;
use crate::budget::DailyBudget;
use crate::db::{Database, JobFilter, TriageFilter, TriagePatch};
use crate::errors::AppError;
use crate::models::{Job, TriageStatus, UserProfile};

pub const DEFAULT_RECENT_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageMode {
    New,
    Recent,
}

impl TriageMode {
    /// Anything that isn't explicitly `recent` triages new jobs only.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("recent") {
            TriageMode::Recent
        } else {
            TriageMode::New
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriageInput {
    pub mode: TriageMode,
    pub days: Option<i64>,
}

impl Default for TriageInput {
    fn default() -> Self {
        Self {
            mode: TriageMode::New,
            days: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TriageOutcome {
    pub mode: TriageMode,
    pub days: i64,
    pub processed: usize,
    pub triaged: usize,
    pub skipped: usize,
    pub openai_used: usize,
    pub openai_skipped_cap: usize,
}

fn is_recent(job: &Job, cutoff: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(job.effective_date()) {
        Ok(parsed) => parsed.to_utc() >= cutoff,
        Err(_) => false,
    }
}

/// Batch triage: coarse-classify each candidate, escalate ambiguous results
/// to the hosted model while the daily budget lasts, persist every decision.
///
/// A coarse provider failure or a persistence failure aborts the batch;
/// partial batches are deliberately loud rather than silently incomplete.
pub fn triage_jobs(
    db: &Database,
    triage: &dyn JobTriage,
    profile: &UserProfile,
    budget: &mut DailyBudget,
    now: DateTime<Utc>,
    input: TriageInput,
) -> Result<TriageOutcome, AppError> {
    let days = input.days.filter(|d| *d > 0).unwrap_or(DEFAULT_RECENT_DAYS);

    let candidates: Vec<Job> = match input.mode {
        TriageMode::New => db.list_jobs(&JobFilter {
            triage: Some(TriageFilter::Untriaged),
            ..Default::default()
        })?,
        TriageMode::Recent => {
            let cutoff = now - Duration::days(days);
            db.list_jobs(&JobFilter::default())?
                .into_iter()
                .filter(|job| is_recent(job, cutoff))
                .collect()
        }
    };

    let today = now.format("%Y-%m-%d").to_string();
    let triaged_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut triaged = 0;
    let mut skipped = 0;
    let mut openai_used = 0;
    let mut openai_skipped_cap = 0;

    for job in &candidates {
        let coarse = triage
            .coarse(job, profile)
            .map_err(|error| AppError::provider(error.to_string()))?;
        let Some(coarse) = coarse else {
            skipped += 1;
            continue;
        };

        let mut final_decision = coarse.clone();
        if coarse.status == TriageStatus::Maybe && triage.disambiguation_available() {
            if budget.try_consume(&today) {
                openai_used += 1;
                match triage.disambiguate(job, profile, &coarse) {
                    Ok(Some(decision)) => final_decision = decision,
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(job_id = job.id, error = %error, "disambiguation failed; keeping coarse decision");
                    }
                }
            } else {
                openai_skipped_cap += 1;
            }
        }

        db.update_triage(
            job.id,
            &TriagePatch {
                status: final_decision.status,
                reasons: final_decision.reasons,
                triaged_at: triaged_at.clone(),
                provider: final_decision.provider,
                version: profile.profile_version,
            },
        )?;
        triaged += 1;
    }

    tracing::info!(
        processed = candidates.len(),
        triaged,
        skipped,
        openai_used,
        openai_skipped_cap,
        "triage batch finished"
    );

    Ok(TriageOutcome {
        mode: input.mode,
        days,
        processed: candidates.len(),
        triaged,
        skipped,
        openai_used,
        openai_skipped_cap,
    })
}
