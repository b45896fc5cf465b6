use chrono::{DateTime, Duration, Local, SecondsFormat};
use serde::Serialize;

use crate::db::{ApplicationDraft, ApplicationFilter, ApplicationPatch, Database};
use crate::errors::AppError;
use crate::models::{Application, ApplicationStatus, LogEventType, Priority};

// --- Date-only helpers ---
// Follow-up dates are calendar dates compared as strings; no timezone math.

pub fn is_date_only(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() })
}

pub fn date_only(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

pub fn add_days_date_only(now: DateTime<Local>, days: i64) -> String {
    date_only(now + Duration::days(days))
}

fn iso_now(now: DateTime<Local>) -> String {
    now.to_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// --- Use cases ---

/// "Save" a job: open an application in `saved` with a follow-up for
/// tomorrow, linked back to the posting.
pub fn save_job_as_application(
    db: &Database,
    job_id: i64,
    now: DateTime<Local>,
) -> Result<Application, AppError> {
    let job = db.get_job(job_id)?.ok_or(AppError::JobNotFound(job_id))?;

    let created_at = iso_now(now);
    let application = db.create_application(
        &ApplicationDraft {
            job_id: Some(job.id),
            company: job.company,
            role: job.role,
            status: ApplicationStatus::Saved,
            priority: Priority::Medium,
            next_action_at: Some(add_days_date_only(now, 1)),
            source: job.source,
            notes: String::new(),
        },
        &created_at,
    )?;
    db.create_log(
        application.id,
        LogEventType::CreatedFromJob,
        "Application created from saved job.",
        &created_at,
    )?;
    Ok(application)
}

#[derive(Debug, Default, Clone)]
pub struct NewApplicationInput {
    pub company: String,
    pub role: String,
    pub status: Option<ApplicationStatus>,
    pub priority: Option<Priority>,
    pub next_action_at: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
}

pub fn create_application(
    db: &Database,
    input: NewApplicationInput,
    now: DateTime<Local>,
) -> Result<Application, AppError> {
    let company = input.company.trim();
    let role = input.role.trim();
    if company.is_empty() {
        return Err(AppError::validation("Company is required."));
    }
    if role.is_empty() {
        return Err(AppError::validation("Role is required."));
    }
    if let Some(date) = input.next_action_at.as_deref() {
        if !is_date_only(date) {
            return Err(AppError::validation(format!(
                "Invalid date-only value: {date}"
            )));
        }
    }

    let created_at = iso_now(now);
    let application = db.create_application(
        &ApplicationDraft {
            job_id: None,
            company: company.to_string(),
            role: role.to_string(),
            status: input.status.unwrap_or(ApplicationStatus::Saved),
            priority: input.priority.unwrap_or(Priority::Medium),
            next_action_at: input.next_action_at,
            source: input.source.unwrap_or_else(|| "Manual".to_string()),
            notes: input.notes.unwrap_or_default(),
        },
        &created_at,
    )?;
    db.create_log(
        application.id,
        LogEventType::Created,
        "Application created.",
        &created_at,
    )?;
    Ok(application)
}

/// `next_action_at`: `None` leaves the field alone, `Some(None)` clears it.
#[derive(Debug, Default, Clone)]
pub struct UpdateApplicationInput {
    pub id: i64,
    pub status: Option<ApplicationStatus>,
    pub priority: Option<Priority>,
    pub next_action_at: Option<Option<String>>,
    pub notes: Option<String>,
}

/// Applies a field-diffed patch and appends one log entry per changed
/// field category. Priority changes patch silently; there is no log event
/// for them.
pub fn update_application(
    db: &Database,
    input: UpdateApplicationInput,
    now: DateTime<Local>,
) -> Result<Application, AppError> {
    let existing = db
        .get_application(input.id)?
        .ok_or(AppError::ApplicationNotFound(input.id))?;

    let updated_at = iso_now(now);
    let mut patch = ApplicationPatch::default();
    let mut logs: Vec<(LogEventType, String)> = Vec::new();

    if let Some(status) = input.status {
        if status != existing.status {
            patch.status = Some(status);
            logs.push((
                LogEventType::StatusChanged,
                format!("Status changed to {}.", status.as_str()),
            ));
        }
    }

    if let Some(priority) = input.priority {
        if priority != existing.priority {
            patch.priority = Some(priority);
        }
    }

    if let Some(notes) = input.notes {
        if notes != existing.notes {
            patch.notes = Some(notes);
            logs.push((LogEventType::NotesUpdated, "Notes updated.".to_string()));
        }
    }

    if let Some(next_action) = input.next_action_at {
        if next_action != existing.next_action_at {
            if let Some(date) = next_action.as_deref() {
                if !is_date_only(date) {
                    return Err(AppError::validation(format!(
                        "Invalid date-only value: {date}"
                    )));
                }
            }
            logs.push(match next_action.as_deref() {
                Some(date) => (
                    LogEventType::NextActionSet,
                    format!("Next action scheduled for {date}."),
                ),
                None => (
                    LogEventType::NextActionCleared,
                    "Next action cleared.".to_string(),
                ),
            });
            patch.next_action_at = Some(next_action);
        }
    }

    let updated = db.update_application(existing.id, &patch, &updated_at)?;
    for (kind, message) in logs {
        db.create_log(existing.id, kind, &message, &updated_at)?;
    }
    Ok(updated)
}

/// Idempotent: an already-archived application with no pending follow-up
/// comes back unchanged, with no new log entry.
pub fn archive_application(
    db: &Database,
    id: i64,
    now: DateTime<Local>,
) -> Result<Application, AppError> {
    let existing = db
        .get_application(id)?
        .ok_or(AppError::ApplicationNotFound(id))?;

    if existing.status == ApplicationStatus::Archived && existing.next_action_at.is_none() {
        return Ok(existing);
    }

    let updated_at = iso_now(now);
    let updated = db.update_application(
        existing.id,
        &ApplicationPatch {
            status: Some(ApplicationStatus::Archived),
            next_action_at: Some(None),
            ..Default::default()
        },
        &updated_at,
    )?;
    db.create_log(
        existing.id,
        LogEventType::StatusChanged,
        "Application archived.",
        &updated_at,
    )?;
    Ok(updated)
}

// --- Inbox grouping ---

#[derive(Debug, Default, Serialize)]
pub struct InboxGroups {
    pub overdue: Vec<Application>,
    pub today: Vec<Application>,
    pub upcoming: Vec<Application>,
}

/// Pure partition on the date-only follow-up field. Applications without
/// one appear in no bucket.
pub fn group_inbox(items: Vec<Application>, today: &str) -> InboxGroups {
    let mut groups = InboxGroups::default();
    for item in items {
        let Some(next_action) = item.next_action_at.as_deref() else {
            continue;
        };
        match next_action.cmp(today) {
            std::cmp::Ordering::Less => groups.overdue.push(item),
            std::cmp::Ordering::Equal => groups.today.push(item),
            std::cmp::Ordering::Greater => groups.upcoming.push(item),
        }
    }
    groups
}

pub fn list_inbox(db: &Database, today: &str) -> Result<InboxGroups, AppError> {
    let items = db.list_applications(&ApplicationFilter::default())?;
    Ok(group_inbox(items, today))
}
