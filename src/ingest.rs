use anyhow::Result;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;

use crate::db::{Database, IngestRunDraft, JobUpsert, UpsertCounts};
use crate::errors::AppError;
use crate::models::IngestRunStatus;
use crate::sources::{SourceQuery, SourceRecord, SourceRouter};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestOutcome {
    pub fetched: usize,
    pub created: i64,
    pub updated: i64,
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestStatus {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

/// Start of the current local day, rendered as RFC 3339 UTC so it compares
/// lexically against stored run timestamps.
pub fn start_of_today(now: DateTime<Local>) -> String {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(Local).earliest());
    match midnight {
        Some(start) => start.to_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
        // A timezone without a representable local midnight falls back to
        // "now", which only under-counts the window.
        None => now.to_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

fn to_upsert(record: &SourceRecord) -> JobUpsert {
    JobUpsert {
        external_id: record.external_id.clone(),
        source: record.source.clone(),
        role: record.role.clone(),
        company: record.company.clone(),
        location: record.location.clone(),
        seniority: record.seniority.clone(),
        tags: record.tags.clone(),
        description: record.description.clone(),
        source_url: Some(record.source_url.clone()),
        published_at: record.published_at.clone(),
    }
}

fn fetch_and_upsert(
    db: &Database,
    router: &SourceRouter,
    query: &SourceQuery,
    now: &str,
) -> Result<(usize, UpsertCounts)> {
    let records = router.list(query)?;
    if records.is_empty() {
        return Ok((0, UpsertCounts::default()));
    }
    let upserts: Vec<JobUpsert> = records.iter().map(to_upsert).collect();
    let counts = db.upsert_jobs(&upserts, now)?;
    Ok((records.len(), counts))
}

/// Budget-governed ingestion. Every attempt records an `IngestRun` before
/// returning, success or failure, and every recorded run consumes budget:
/// the cap throttles attempts, not successes.
pub fn ingest_jobs(
    db: &Database,
    router: &SourceRouter,
    cap: i64,
    query: &SourceQuery,
    now: DateTime<Utc>,
    since: &str,
) -> Result<IngestOutcome, AppError> {
    if cap <= 0 {
        return Err(AppError::validation(
            "Ingestion is disabled (INGEST_DAILY_CAP is 0).",
        ));
    }

    let used = db.count_ingest_runs_since(since)?;
    if used >= cap {
        return Err(AppError::CapReached { used, limit: cap });
    }

    let created_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let source = query
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    match fetch_and_upsert(db, router, query, &created_at) {
        Ok((fetched, counts)) => {
            db.create_ingest_run(&IngestRunDraft {
                source,
                status: IngestRunStatus::Success,
                created: counts.created,
                updated: counts.updated,
                error: None,
                created_at,
            })?;
            let used_after = db.count_ingest_runs_since(since)?;
            tracing::info!(fetched, created = counts.created, updated = counts.updated, "ingest finished");
            Ok(IngestOutcome {
                fetched,
                created: counts.created,
                updated: counts.updated,
                used: used_after,
                limit: cap,
                remaining: (cap - used_after).max(0),
            })
        }
        Err(error) => {
            db.create_ingest_run(&IngestRunDraft {
                source,
                status: IngestRunStatus::Failed,
                created: 0,
                updated: 0,
                error: Some(error.to_string()),
                created_at,
            })?;
            tracing::error!(error = %error, "ingest failed");
            Err(AppError::Internal(error))
        }
    }
}

pub fn ingest_status(db: &Database, cap: i64, since: &str) -> Result<IngestStatus, AppError> {
    let used = if cap > 0 {
        db.count_ingest_runs_since(since)?
    } else {
        0
    };
    Ok(IngestStatus {
        used,
        limit: cap,
        remaining: (cap - used).max(0),
    })
}
