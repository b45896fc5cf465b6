use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{
    normalize_seniority, other_source_requested, parse_published_at, passes_keyword_filter,
    shared_client, tags_from_value, JobSource, SourceQuery, SourceRecord,
};

const SOURCE: &str = "Web3";
const BASE_URL: &str = "https://web3.career/api/v1";

const INCLUDE_KEYWORDS: &[&str] = &["frontend", "front-end", "react"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Web3Job {
    id: Option<serde_json::Value>,
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    country: Option<String>,
    city: Option<String>,
    apply_url: Option<String>,
    tags: Option<serde_json::Value>,
    description: Option<String>,
    date: Option<String>,
    date_epoch: Option<f64>,
}

pub struct Web3Source {
    client: reqwest::blocking::Client,
    token: String,
}

impl Web3Source {
    pub fn new(token: String) -> Result<Self> {
        Ok(Self {
            client: shared_client()?,
            token,
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

fn published_at(job: &Web3Job) -> Option<String> {
    if let Some(epoch) = job.date_epoch.filter(|value| value.is_finite()) {
        // Epochs arrive in seconds or milliseconds depending on the entry.
        let millis = if epoch < 1e12 { epoch * 1000.0 } else { epoch };
        if let Some(parsed) = chrono::DateTime::from_timestamp_millis(millis as i64) {
            return Some(parsed.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        }
    }
    job.date.as_deref().and_then(parse_published_at)
}

fn location(job: &Web3Job) -> String {
    if let Some(value) = job.location.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        return value.to_string();
    }
    let parts: Vec<&str> = [job.city.as_deref(), job.country.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if parts.is_empty() {
        "Remote".to_string()
    } else {
        parts.join(", ")
    }
}

fn to_record(job: &Web3Job) -> Option<SourceRecord> {
    let external_id = job.id.as_ref().and_then(id_to_string)?;
    let title = job
        .title
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let company = job
        .company
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let apply_url = job
        .apply_url
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?;

    Some(SourceRecord {
        external_id,
        source: SOURCE.to_string(),
        role: title.to_string(),
        company: company.to_string(),
        location: location(job),
        seniority: normalize_seniority(title).to_string(),
        tags: tags_from_value(job.tags.as_ref()),
        description: job
            .description
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string()),
        source_url: apply_url.to_string(),
        published_at: published_at(job),
    })
}

/// The API wraps results in a 3-element envelope `[meta, meta, jobs]`; the
/// job entries live at index 2. `None` means the envelope wasn't there.
/// Entries inside the array that aren't job-shaped are dropped.
fn jobs_from_payload(payload: &serde_json::Value) -> Option<Vec<Web3Job>> {
    let jobs = payload.get(2)?.as_array()?;
    Some(
        jobs.iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect(),
    )
}

impl JobSource for Web3Source {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn list(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
        if other_source_requested(query, SOURCE) {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .get(BASE_URL)
            .query(&[("token", self.token.as_str()), ("remote", "true"), ("tag", "front-end")]);
        if let Some(limit) = query.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }

        let response = request.send().context("Failed to fetch Web3 jobs")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Web3 request failed with status {}",
                response.status()
            ));
        }

        let payload: serde_json::Value =
            response.json().context("Unexpected Web3 payload")?;
        let Some(jobs) = jobs_from_payload(&payload) else {
            tracing::warn!(is_array = payload.is_array(), "Web3 payload had an unexpected shape");
            return Ok(Vec::new());
        };

        let mut records: Vec<SourceRecord> = jobs
            .iter()
            .filter_map(to_record)
            .filter(|record| passes_keyword_filter(record, INCLUDE_KEYWORDS, &[]))
            .collect();
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}
