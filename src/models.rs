use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageStatus {
    Shortlist,
    Maybe,
    Reject,
}

impl TriageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageStatus::Shortlist => "shortlist",
            TriageStatus::Maybe => "maybe",
            TriageStatus::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "shortlist" => Some(TriageStatus::Shortlist),
            "maybe" => Some(TriageStatus::Maybe),
            "reject" => Some(TriageStatus::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAi => "openai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ollama" => Some(Provider::Ollama),
            "openai" => Some(Provider::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
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
    pub triage_status: Option<TriageStatus>,
    pub triage_reasons: Vec<String>,
    pub triaged_at: Option<String>,
    pub triage_provider: Option<Provider>,
    pub triage_version: Option<i64>,
    pub rank_score: Option<i64>,
    pub rank_reason: Option<String>,
    pub rank_provider: Option<Provider>,
    pub rank_version: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// A job triaged under an older profile version is stale and eligible
    /// for re-processing.
    pub fn needs_retriage(&self, profile_version: i64) -> bool {
        self.triage_status.is_some() && self.triage_version != Some(profile_version)
    }

    /// Reference date for recency checks: publication date when the feed
    /// provided one, otherwise when we first saw the job.
    pub fn effective_date(&self) -> &str {
        self.published_at.as_deref().unwrap_or(&self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub profile_version: i64,
    pub must_have_keywords: Vec<String>,
    pub hard_no_keywords: Vec<String>,
    pub preferred_keywords: Vec<String>,
    pub excluded_keywords: Vec<String>,
    pub notes: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            profile_version: 1,
            must_have_keywords: Vec::new(),
            hard_no_keywords: Vec::new(),
            preferred_keywords: Vec::new(),
            excluded_keywords: Vec::new(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Saved,
    Applied,
    Screen,
    Tech,
    Offer,
    Rejected,
    Ghosted,
    Archived,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "saved",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Screen => "screen",
            ApplicationStatus::Tech => "tech",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Ghosted => "ghosted",
            ApplicationStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "saved" => Some(ApplicationStatus::Saved),
            "applied" => Some(ApplicationStatus::Applied),
            "screen" => Some(ApplicationStatus::Screen),
            "tech" => Some(ApplicationStatus::Tech),
            "offer" => Some(ApplicationStatus::Offer),
            "rejected" => Some(ApplicationStatus::Rejected),
            "ghosted" => Some(ApplicationStatus::Ghosted),
            "archived" => Some(ApplicationStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub job_id: Option<i64>,
    pub company: String,
    pub role: String,
    pub status: ApplicationStatus,
    pub priority: Priority,
    /// Date-only (`YYYY-MM-DD`), compared lexically.
    pub next_action_at: Option<String>,
    pub source: String,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    Created,
    CreatedFromJob,
    StatusChanged,
    NotesUpdated,
    NextActionSet,
    NextActionCleared,
}

impl LogEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEventType::Created => "created",
            LogEventType::CreatedFromJob => "created_from_job",
            LogEventType::StatusChanged => "status_changed",
            LogEventType::NotesUpdated => "notes_updated",
            LogEventType::NextActionSet => "next_action_set",
            LogEventType::NextActionCleared => "next_action_cleared",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(LogEventType::Created),
            "created_from_job" => Some(LogEventType::CreatedFromJob),
            "status_changed" => Some(LogEventType::StatusChanged),
            "notes_updated" => Some(LogEventType::NotesUpdated),
            "next_action_set" => Some(LogEventType::NextActionSet),
            "next_action_cleared" => Some(LogEventType::NextActionCleared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationLogEntry {
    pub id: i64,
    pub application_id: i64,
    pub kind: LogEventType,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestRunStatus {
    Success,
    Failed,
}

impl IngestRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestRunStatus::Success => "success",
            IngestRunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(IngestRunStatus::Success),
            "failed" => Some(IngestRunStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRun {
    pub id: i64,
    pub source: Option<String>,
    pub status: IngestRunStatus,
    pub created: i64,
    pub updated: i64,
    pub error: Option<String>,
    pub created_at: String,
}
