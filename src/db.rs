use anyhow::{anyhow, Context, Result};
use rusqlite::{params, params_from_iter, Connection};
use std::path::PathBuf;

use crate::models::{
    Application, ApplicationLogEntry, ApplicationStatus, IngestRun, IngestRunStatus, Job,
    LogEventType, Priority, Provider, TriageStatus,
};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

const JOB_COLUMNS: &str = "id, external_id, source, role, company, location, seniority, tags, \
     description, source_url, published_at, triage_status, triage_reasons, triaged_at, \
     triage_provider, triage_version, rank_score, rank_reason, rank_provider, rank_version, \
     created_at, updated_at";

const APPLICATION_COLUMNS: &str =
    "id, job_id, company, role, status, priority, next_action_at, source, notes, \
     created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub search: Option<String>,
    pub seniority: Option<String>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub triage: Option<TriageFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageFilter {
    Untriaged,
    Status(TriageStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrder {
    UpdatedAt,
    PublishedAt,
    RankScore,
}

#[derive(Debug, Clone)]
pub struct JobUpsert {
    pub external_id: String,
    pub source: String,
    pub role: String,
    pub company: String,
    pub location: String,
    pub seniority: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobDraft {
    pub external_id: Option<String>,
    pub source: String,
    pub role: String,
    pub company: String,
    pub location: String,
    pub seniority: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UpsertCounts {
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone)]
pub struct TriagePatch {
    pub status: TriageStatus,
    pub reasons: Vec<String>,
    pub triaged_at: String,
    pub provider: Provider,
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct RankPatch {
    pub score: i64,
    pub reason: String,
    pub provider: Provider,
    pub version: i64,
}

#[derive(Debug, Default, Clone)]
pub struct ApplicationFilter {
    pub search: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub priority: Option<Priority>,
    pub updated_after: Option<String>,
    pub job_ids: Option<Vec<i64>>,
}

#[derive(Debug, Default, Clone)]
pub struct ApplicationCountFilter {
    pub status_in: Vec<ApplicationStatus>,
    pub updated_after: Option<String>,
    pub overdue_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApplicationDraft {
    pub job_id: Option<i64>,
    pub company: String,
    pub role: String,
    pub status: ApplicationStatus,
    pub priority: Priority,
    pub next_action_at: Option<String>,
    pub source: String,
    pub notes: String,
}

/// `next_action_at` distinguishes "leave alone" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Default, Clone)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub priority: Option<Priority>,
    pub next_action_at: Option<Option<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestRunDraft {
    pub source: Option<String>,
    pub status: IngestRunStatus,
    pub created: i64,
    pub updated: i64,
    pub error: Option<String>,
    pub created_at: String,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    pub fn open_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "pursuit") {
            Ok(proj_dirs.data_dir().join("pursuit.db"))
        } else {
            Ok(PathBuf::from("pursuit.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT,
                source TEXT NOT NULL,
                role TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT 'Remote',
                seniority TEXT NOT NULL DEFAULT 'Mid',
                tags TEXT NOT NULL DEFAULT '[]',
                description TEXT,
                source_url TEXT,
                published_at TEXT,
                triage_status TEXT CHECK (triage_status IN ('shortlist', 'maybe', 'reject')),
                triage_reasons TEXT,
                triaged_at TEXT,
                triage_provider TEXT CHECK (triage_provider IN ('ollama', 'openai')),
                triage_version INTEGER,
                rank_score INTEGER,
                rank_reason TEXT,
                rank_provider TEXT CHECK (rank_provider IN ('ollama', 'openai')),
                rank_version INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (source, external_id)
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER REFERENCES jobs(id),
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'saved'
                    CHECK (status IN ('saved', 'applied', 'screen', 'tech', 'offer',
                                      'rejected', 'ghosted', 'archived')),
                priority TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high')),
                next_action_at TEXT,
                source TEXT NOT NULL DEFAULT 'Manual',
                notes TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS application_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                application_id INTEGER NOT NULL REFERENCES applications(id),
                type TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ingest_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT,
                status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
                created INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_external ON jobs(source, external_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_triage ON jobs(triage_status);
            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
            CREATE INDEX IF NOT EXISTS idx_logs_application ON application_logs(application_id);
            CREATE INDEX IF NOT EXISTS idx_ingest_runs_created ON ingest_runs(created_at);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'pursuit init' first."));
        }
        Ok(())
    }

    // --- Job operations ---

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut sql_params: Vec<Option<String>> = Vec::new();
        let where_clause = job_where_clause(filter, &mut sql_params);
        // Shortlisted jobs first, untriaged last; freshest within each band.
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs{where_clause} \
             ORDER BY CASE triage_status \
                 WHEN 'shortlist' THEN 0 WHEN 'maybe' THEN 1 WHEN 'reject' THEN 2 ELSE 3 END, \
             updated_at DESC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params), row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    pub fn list_jobs_page(
        &self,
        filter: &JobFilter,
        order_by: JobOrder,
        ascending: bool,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Job>, i64)> {
        let mut sql_params: Vec<Option<String>> = Vec::new();
        let where_clause = job_where_clause(filter, &mut sql_params);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs{where_clause}"),
            params_from_iter(sql_params.clone()),
            |row| row.get(0),
        )?;

        let direction = if ascending { "ASC" } else { "DESC" };
        let order_clause = match order_by {
            JobOrder::UpdatedAt => format!("updated_at {direction}"),
            // Missing dates sort last regardless of direction.
            JobOrder::PublishedAt => format!("published_at IS NULL, published_at {direction}"),
            JobOrder::RankScore => {
                "rank_score IS NULL, rank_score DESC, published_at IS NULL, published_at DESC"
                    .to_string()
            }
        };

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs{where_clause} ORDER BY {order_clause} \
             LIMIT {} OFFSET {}",
            limit.max(1),
            offset.max(0)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params), row_to_job)?;
        let items = rows
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs page")?;
        Ok((items, total))
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let result = self.conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [id],
            row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn create_job(&self, draft: &JobDraft, now: &str) -> Result<Job> {
        self.conn.execute(
            "INSERT INTO jobs (external_id, source, role, company, location, seniority, tags, \
             description, source_url, published_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                draft.external_id,
                draft.source,
                draft.role,
                draft.company,
                draft.location,
                draft.seniority,
                serde_json::to_string(&draft.tags)?,
                draft.description,
                draft.source_url,
                draft.published_at,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_job(id)?
            .ok_or_else(|| anyhow!("Job vanished after insert: {}", id))
    }

    /// Matches existing jobs by `(source, external_id)`; hits overwrite the
    /// mutable content fields and `updated_at`, misses insert with empty
    /// triage/rank state.
    pub fn upsert_jobs(&self, records: &[JobUpsert], now: &str) -> Result<UpsertCounts> {
        let mut counts = UpsertCounts::default();

        for record in records {
            let existing: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM jobs WHERE source = ?1 AND external_id = ?2",
                    params![record.source, record.external_id],
                    |row| row.get(0),
                )
                .ok();

            let tags = serde_json::to_string(&record.tags)?;
            match existing {
                Some(id) => {
                    self.conn.execute(
                        "UPDATE jobs SET role = ?1, company = ?2, location = ?3, seniority = ?4, \
                         tags = ?5, description = ?6, source_url = ?7, published_at = ?8, \
                         updated_at = ?9 WHERE id = ?10",
                        params![
                            record.role,
                            record.company,
                            record.location,
                            record.seniority,
                            tags,
                            record.description,
                            record.source_url,
                            record.published_at,
                            now,
                            id,
                        ],
                    )?;
                    counts.updated += 1;
                }
                None => {
                    self.conn.execute(
                        "INSERT INTO jobs (external_id, source, role, company, location, \
                         seniority, tags, description, source_url, published_at, created_at, \
                         updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                        params![
                            record.external_id,
                            record.source,
                            record.role,
                            record.company,
                            record.location,
                            record.seniority,
                            tags,
                            record.description,
                            record.source_url,
                            record.published_at,
                            now,
                        ],
                    )?;
                    counts.created += 1;
                }
            }
        }

        Ok(counts)
    }

    /// Triage writes deliberately leave `updated_at` alone so a re-triage
    /// doesn't extend its own recency window.
    pub fn update_triage(&self, id: i64, patch: &TriagePatch) -> Result<Job> {
        let changed = self.conn.execute(
            "UPDATE jobs SET triage_status = ?1, triage_reasons = ?2, triaged_at = ?3, \
             triage_provider = ?4, triage_version = ?5 WHERE id = ?6",
            params![
                patch.status.as_str(),
                serde_json::to_string(&patch.reasons)?,
                patch.triaged_at,
                patch.provider.as_str(),
                patch.version,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("Job not found: {}", id));
        }
        self.get_job(id)?
            .ok_or_else(|| anyhow!("Job not found: {}", id))
    }

    pub fn update_rank(&self, id: i64, patch: &RankPatch, now: &str) -> Result<Job> {
        let changed = self.conn.execute(
            "UPDATE jobs SET rank_score = ?1, rank_reason = ?2, rank_provider = ?3, \
             rank_version = ?4, updated_at = ?5 WHERE id = ?6",
            params![
                patch.score,
                patch.reason,
                patch.provider.as_str(),
                patch.version,
                now,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("Job not found: {}", id));
        }
        self.get_job(id)?
            .ok_or_else(|| anyhow!("Job not found: {}", id))
    }

    pub fn list_sources(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT source FROM jobs ORDER BY source")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list sources")
    }

    // --- Application operations ---

    pub fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let mut sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE 1=1");
        let mut sql_params: Vec<Option<String>> = Vec::new();

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", search.to_lowercase());
            sql_params.push(Some(pattern.clone()));
            let first = sql_params.len();
            sql_params.push(Some(pattern));
            let second = sql_params.len();
            sql.push_str(&format!(
                " AND (LOWER(company) LIKE ?{first} OR LOWER(role) LIKE ?{second})"
            ));
        }
        if let Some(status) = filter.status {
            sql_params.push(Some(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", sql_params.len()));
        }
        if let Some(priority) = filter.priority {
            sql_params.push(Some(priority.as_str().to_string()));
            sql.push_str(&format!(" AND priority = ?{}", sql_params.len()));
        }
        if let Some(updated_after) = &filter.updated_after {
            sql_params.push(Some(updated_after.clone()));
            sql.push_str(&format!(" AND updated_at >= ?{}", sql_params.len()));
        }
        if let Some(job_ids) = &filter.job_ids {
            if job_ids.is_empty() {
                return Ok(Vec::new());
            }
            let ids = job_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" AND job_id IN ({ids})"));
        }

        sql.push_str(" ORDER BY updated_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params), row_to_application)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list applications")
    }

    pub fn count_applications(&self, filter: &ApplicationCountFilter) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM applications WHERE 1=1");
        let mut sql_params: Vec<Option<String>> = Vec::new();

        if !filter.status_in.is_empty() {
            let statuses = filter
                .status_in
                .iter()
                .map(|s| format!("'{}'", s.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" AND status IN ({statuses})"));
        }
        if let Some(updated_after) = &filter.updated_after {
            sql_params.push(Some(updated_after.clone()));
            sql.push_str(&format!(" AND updated_at >= ?{}", sql_params.len()));
        }
        if let Some(overdue) = &filter.overdue_date {
            sql_params.push(Some(overdue.clone()));
            sql.push_str(&format!(
                " AND next_action_at IS NOT NULL AND next_action_at < ?{}",
                sql_params.len()
            ));
        }

        let count = self
            .conn
            .query_row(&sql, params_from_iter(sql_params), |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_application(&self, id: i64) -> Result<Option<Application>> {
        let result = self.conn.query_row(
            &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
            [id],
            row_to_application,
        );
        match result {
            Ok(app) => Ok(Some(app)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn latest_application_id(&self) -> Result<Option<i64>> {
        let result = self
            .conn
            .query_row("SELECT MAX(id) FROM applications", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?;
        Ok(result)
    }

    pub fn create_application(&self, draft: &ApplicationDraft, now: &str) -> Result<Application> {
        self.conn.execute(
            "INSERT INTO applications (job_id, company, role, status, priority, next_action_at, \
             source, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                draft.job_id,
                draft.company,
                draft.role,
                draft.status.as_str(),
                draft.priority.as_str(),
                draft.next_action_at,
                draft.source,
                draft.notes,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_application(id)?
            .ok_or_else(|| anyhow!("Application vanished after insert: {}", id))
    }

    pub fn update_application(
        &self,
        id: i64,
        patch: &ApplicationPatch,
        now: &str,
    ) -> Result<Application> {
        let mut sets: Vec<String> = Vec::new();
        let mut sql_params: Vec<Option<String>> = Vec::new();

        if let Some(status) = patch.status {
            sql_params.push(Some(status.as_str().to_string()));
            sets.push(format!("status = ?{}", sql_params.len()));
        }
        if let Some(priority) = patch.priority {
            sql_params.push(Some(priority.as_str().to_string()));
            sets.push(format!("priority = ?{}", sql_params.len()));
        }
        if let Some(next_action) = &patch.next_action_at {
            sql_params.push(next_action.clone());
            sets.push(format!("next_action_at = ?{}", sql_params.len()));
        }
        if let Some(notes) = &patch.notes {
            sql_params.push(Some(notes.clone()));
            sets.push(format!("notes = ?{}", sql_params.len()));
        }
        sql_params.push(Some(now.to_string()));
        sets.push(format!("updated_at = ?{}", sql_params.len()));

        let sql = format!(
            "UPDATE applications SET {} WHERE id = {}",
            sets.join(", "),
            id
        );
        let changed = self.conn.execute(&sql, params_from_iter(sql_params))?;
        if changed == 0 {
            return Err(anyhow!("Application not found: {}", id));
        }
        self.get_application(id)?
            .ok_or_else(|| anyhow!("Application not found: {}", id))
    }

    // --- Application log operations ---

    pub fn create_log(
        &self,
        application_id: i64,
        kind: LogEventType,
        message: &str,
        created_at: &str,
    ) -> Result<ApplicationLogEntry> {
        self.conn.execute(
            "INSERT INTO application_logs (application_id, type, message, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![application_id, kind.as_str(), message, created_at],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(ApplicationLogEntry {
            id,
            application_id,
            kind,
            message: message.to_string(),
            created_at: created_at.to_string(),
        })
    }

    pub fn list_application_logs(
        &self,
        application_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<ApplicationLogEntry>> {
        let mut sql = String::from(
            "SELECT id, application_id, type, message, created_at FROM application_logs \
             WHERE application_id = ?1 ORDER BY created_at DESC, id DESC",
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([application_id], row_to_log_entry)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list application logs")
    }

    // --- Ingest run operations ---

    pub fn count_ingest_runs_since(&self, since: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM ingest_runs WHERE created_at >= ?1",
            [since],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn create_ingest_run(&self, draft: &IngestRunDraft) -> Result<()> {
        self.conn.execute(
            "INSERT INTO ingest_runs (source, status, created, updated, error, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                draft.source,
                draft.status.as_str(),
                draft.created,
                draft.updated,
                draft.error,
                draft.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_ingest_runs(&self, limit: i64) -> Result<Vec<IngestRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, status, created, updated, error, created_at FROM ingest_runs \
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit.max(0)], row_to_ingest_run)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list ingest runs")
    }
}

fn job_where_clause(filter: &JobFilter, sql_params: &mut Vec<Option<String>>) -> String {
    let mut sql = String::from(" WHERE 1=1");

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", search.to_lowercase());
        sql_params.push(Some(pattern.clone()));
        let first = sql_params.len();
        sql_params.push(Some(pattern));
        let second = sql_params.len();
        sql.push_str(&format!(
            " AND (LOWER(role) LIKE ?{first} OR LOWER(company) LIKE ?{second})"
        ));
    }
    if let Some(seniority) = &filter.seniority {
        sql_params.push(Some(seniority.clone()));
        sql.push_str(&format!(" AND seniority = ?{}", sql_params.len()));
    }
    if let Some(source) = &filter.source {
        sql_params.push(Some(source.clone()));
        sql.push_str(&format!(" AND source = ?{}", sql_params.len()));
    }
    for tag in &filter.tags {
        // Tags are stored as a JSON array, so a quoted match is exact
        // enough for membership.
        sql_params.push(Some(format!("%\"{}\"%", tag)));
        sql.push_str(&format!(" AND tags LIKE ?{}", sql_params.len()));
    }
    match filter.triage {
        Some(TriageFilter::Untriaged) => sql.push_str(" AND triage_status IS NULL"),
        Some(TriageFilter::Status(status)) => {
            sql_params.push(Some(status.as_str().to_string()));
            sql.push_str(&format!(" AND triage_status = ?{}", sql_params.len()));
        }
        None => {}
    }

    sql
}

fn parse_tags(raw: Option<String>) -> Vec<String> {
    raw.and_then(|value| serde_json::from_str(&value).ok())
        .unwrap_or_default()
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        external_id: row.get(1)?,
        source: row.get(2)?,
        role: row.get(3)?,
        company: row.get(4)?,
        location: row.get(5)?,
        seniority: row.get(6)?,
        tags: parse_tags(row.get(7)?),
        description: row.get(8)?,
        source_url: row.get(9)?,
        published_at: row.get(10)?,
        triage_status: row
            .get::<_, Option<String>>(11)?
            .and_then(|v| TriageStatus::parse(&v)),
        triage_reasons: parse_tags(row.get(12)?),
        triaged_at: row.get(13)?,
        triage_provider: row
            .get::<_, Option<String>>(14)?
            .and_then(|v| Provider::parse(&v)),
        triage_version: row.get(15)?,
        rank_score: row.get(16)?,
        rank_reason: row.get(17)?,
        rank_provider: row
            .get::<_, Option<String>>(18)?
            .and_then(|v| Provider::parse(&v)),
        rank_version: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        job_id: row.get(1)?,
        company: row.get(2)?,
        role: row.get(3)?,
        status: ApplicationStatus::parse(&row.get::<_, String>(4)?)
            .unwrap_or(ApplicationStatus::Saved),
        priority: Priority::parse(&row.get::<_, String>(5)?).unwrap_or(Priority::Medium),
        next_action_at: row.get(6)?,
        source: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn row_to_log_entry(row: &rusqlite::Row) -> rusqlite::Result<ApplicationLogEntry> {
    Ok(ApplicationLogEntry {
        id: row.get(0)?,
        application_id: row.get(1)?,
        kind: LogEventType::parse(&row.get::<_, String>(2)?).unwrap_or(LogEventType::Created),
        message: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_ingest_run(row: &rusqlite::Row) -> rusqlite::Result<IngestRun> {
    Ok(IngestRun {
        id: row.get(0)?,
        source: row.get(1)?,
        status: IngestRunStatus::parse(&row.get::<_, String>(2)?)
            .unwrap_or(IngestRunStatus::Failed),
        created: row.get(3)?,
        updated: row.get(4)?,
        error: row.get(5)?,
        created_at: row.get(6)?,
    })
}
