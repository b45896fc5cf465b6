use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{
    normalize_seniority, other_source_requested, parse_published_at, passes_keyword_filter,
    shared_client, JobSource, SourceQuery, SourceRecord,
};

const SOURCE: &str = "Remotive";
const API_URL: &str = "https://remotive.com/api/remote-jobs";

const INCLUDE_KEYWORDS: &[&str] = &["frontend", "react", "ui", "ux", "product", "design"];
const EXCLUDE_KEYWORDS: &[&str] = &["sales", "marketing", "recruiter", "account executive"];

#[derive(Debug, Deserialize)]
struct RemotivePayload {
    #[serde(default)]
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Deserialize)]
struct RemotiveJob {
    id: i64,
    #[serde(default)]
    url: Option<String>,
    title: String,
    company_name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    candidate_required_location: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub struct RemotiveSource {
    client: reqwest::blocking::Client,
}

impl RemotiveSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: shared_client()?,
        })
    }
}

fn to_record(job: &RemotiveJob) -> Option<SourceRecord> {
    let url = job.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
    let tags = if job.tags.is_empty() {
        [job.category.as_deref(), job.job_type.as_deref()]
            .into_iter()
            .flatten()
            .map(|value| value.to_string())
            .collect()
    } else {
        job.tags.clone()
    };

    Some(SourceRecord {
        external_id: job.id.to_string(),
        source: SOURCE.to_string(),
        role: job.title.clone(),
        company: job.company_name.clone(),
        location: job
            .candidate_required_location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("Remote")
            .to_string(),
        seniority: normalize_seniority(&job.title).to_string(),
        tags,
        description: job.description.clone(),
        source_url: url.to_string(),
        published_at: job
            .publication_date
            .as_deref()
            .and_then(parse_published_at),
    })
}

impl JobSource for RemotiveSource {
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
            .context("Failed to fetch Remotive jobs")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Remotive request failed with status {}",
                response.status()
            ));
        }

        let payload: RemotivePayload = response
            .json()
            .context("Failed to parse Remotive payload")?;

        let mut records: Vec<SourceRecord> = payload
            .jobs
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(title: &str, tags: &[&str]) -> RemotiveJob {
        RemotiveJob {
            id: 42,
            url: Some("https://remotive.com/jobs/42".to_string()),
            title: title.to_string(),
            company_name: "Acme".to_string(),
            category: Some("Software Development".to_string()),
            job_type: Some("full_time".to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            candidate_required_location: None,
            publication_date: Some("2026-02-01T08:30:00".to_string()),
            description: Some("<p>Build UIs</p>".to_string()),
        }
    }

    #[test]
    fn maps_fields_and_falls_back_for_tags_and_location() {
        let job = sample_job("Senior React Engineer", &[]);
        let record = to_record(&job).unwrap();
        assert_eq!(record.external_id, "42");
        assert_eq!(record.source, "Remotive");
        assert_eq!(record.location, "Remote");
        assert_eq!(record.seniority, "Senior");
        assert_eq!(record.tags, vec!["Software Development", "full_time"]);
        assert_eq!(
            record.published_at.as_deref(),
            Some("2026-02-01T08:30:00Z")
        );
    }

    #[test]
    fn explicit_tags_win_over_category_fallback() {
        let job = sample_job("React Engineer", &["react", "typescript"]);
        let record = to_record(&job).unwrap();
        assert_eq!(record.tags, vec!["react", "typescript"]);
    }

    #[test]
    fn keyword_filter_keeps_frontend_and_drops_sales() {
        let frontend = to_record(&sample_job("Frontend Engineer", &[])).unwrap();
        assert!(passes_keyword_filter(
            &frontend,
            INCLUDE_KEYWORDS,
            EXCLUDE_KEYWORDS
        ));

        let sales = to_record(&sample_job("Sales Engineer", &[])).unwrap();
        assert!(!passes_keyword_filter(
            &sales,
            INCLUDE_KEYWORDS,
            EXCLUDE_KEYWORDS
        ));

        let backend = to_record(&sample_job("Backend Engineer", &["golang"])).unwrap();
        let mut no_category = backend.clone();
        no_category.tags = vec!["golang".to_string()];
        assert!(!passes_keyword_filter(
            &no_category,
            INCLUDE_KEYWORDS,
            EXCLUDE_KEYWORDS
        ));
    }

    #[test]
    fn payload_without_url_is_dropped() {
        let mut job = sample_job("Frontend Engineer", &[]);
        job.url = None;
        assert!(to_record(&job).is_none());
    }
}
