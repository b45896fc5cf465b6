use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{
    normalize_seniority, other_source_requested, parse_published_at, passes_keyword_filter,
    shared_client, tags_from_value, JobSource, SourceQuery, SourceRecord,
};

const SOURCE: &str = "Remote OK";
const API_URL: &str = "https://remoteok.com/api";

const INCLUDE_KEYWORDS: &[&str] = &["frontend", "front-end", "react", "ui", "ux", "design"];
const EXCLUDE_KEYWORDS: &[&str] = &["sales", "marketing", "recruiter", "account executive"];

/// The API returns a bare array whose first element is a legal notice, so
/// every field is optional and incomplete entries are dropped rather than
/// treated as errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteOkJob {
    id: Option<serde_json::Value>,
    date: Option<String>,
    company: Option<String>,
    position: Option<String>,
    location: Option<String>,
    tags: Option<serde_json::Value>,
    description: Option<String>,
    url: Option<String>,
    apply_url: Option<String>,
}

pub struct RemoteOkSource {
    client: reqwest::blocking::Client,
}

impl RemoteOkSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: shared_client()?,
        })
    }
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn to_record(job: &RemoteOkJob) -> Option<SourceRecord> {
    let external_id = job.id.as_ref().and_then(id_to_string)?;
    let role = job
        .position
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let company = job
        .company
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let source_url = job
        .url
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            job.apply_url
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })?;

    Some(SourceRecord {
        external_id,
        source: SOURCE.to_string(),
        role: role.to_string(),
        company: company.to_string(),
        location: job
            .location
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("Remote")
            .to_string(),
        seniority: normalize_seniority(role).to_string(),
        tags: tags_from_value(job.tags.as_ref()),
        description: job
            .description
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string()),
        source_url: source_url.to_string(),
        published_at: job.date.as_deref().and_then(parse_published_at),
    })
}

impl JobSource for RemoteOkSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn list(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
        if other_source_requested(query, SOURCE) {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(API_URL)
            .send()
            .context("Failed to fetch Remote OK jobs")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Remote OK request failed with status {}",
                response.status()
            ));
        }

        let payload: Vec<RemoteOkJob> = response
            .json()
            .context("Unexpected Remote OK payload")?;

        let mut records: Vec<SourceRecord> = payload
            .iter()
            .filter_map(to_record)
            .filter(|record| passes_keyword_filter(record, INCLUDE_KEYWORDS, EXCLUDE_KEYWORDS))
            .collect();
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}
