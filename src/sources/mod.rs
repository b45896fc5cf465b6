pub mod remoteok;
pub mod remotive;
pub mod web3;
pub mod wwr;

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;

/// One normalized posting as it comes off a feed, before persistence.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub external_id: String,
    pub source: String,
    pub role: String,
    pub company: String,
    pub location: String,
    pub seniority: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub source_url: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct SourceQuery {
    pub source: Option<String>,
    pub limit: Option<usize>,
}

pub trait JobSource {
    fn name(&self) -> &'static str;
    /// Returns `Ok(vec![])` when the query names a different source;
    /// fetch and parse failures propagate.
    fn list(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>>;
}

const ROUTER_MAX_LIMIT: usize = 100;

/// Merges the configured feeds behind one `JobSource`-shaped entry point.
pub struct SourceRouter {
    adapters: Vec<Box<dyn JobSource>>,
}

impl SourceRouter {
    pub fn new(adapters: Vec<Box<dyn JobSource>>) -> Self {
        Self { adapters }
    }

    /// The Web3 feed needs an API token, so it only joins the set when one
    /// is configured; the other feeds are always on.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut adapters: Vec<Box<dyn JobSource>> = vec![
            Box::new(remotive::RemotiveSource::new()?),
            Box::new(remoteok::RemoteOkSource::new()?),
            Box::new(wwr::WwrSource::new()?),
        ];
        if let Some(token) = &config.web3_token {
            adapters.push(Box::new(web3::Web3Source::new(token.clone())?));
        }
        Ok(Self::new(adapters))
    }

    pub fn list(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
        if self.adapters.is_empty() {
            return Ok(Vec::new());
        }

        let limit = normalize_limit(query.limit, ROUTER_MAX_LIMIT);
        let requested = query
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"));

        if let Some(requested) = requested {
            let Some(adapter) = self
                .adapters
                .iter()
                .find(|adapter| adapter.name().eq_ignore_ascii_case(requested))
            else {
                return Ok(Vec::new());
            };
            return adapter.list(&SourceQuery {
                source: Some(adapter.name().to_string()),
                limit,
            });
        }

        let mut merged: Vec<SourceRecord> = Vec::new();
        for adapter in &self.adapters {
            let records = adapter.list(&SourceQuery {
                source: Some(adapter.name().to_string()),
                limit,
            })?;
            merged.extend(records);
        }

        let mut deduped = dedupe_records(merged);
        deduped.sort_by(|left, right| compare_published_desc(left, right));
        if let Some(limit) = limit {
            deduped.truncate(limit);
        }
        Ok(deduped)
    }
}

fn dedupe_records(records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(format!("{}:{}", record.source, record.external_id)))
        .collect()
}

fn compare_published_desc(left: &SourceRecord, right: &SourceRecord) -> std::cmp::Ordering {
    match (&left.published_at, &right.published_at) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (Some(_), None) => std::cmp::Ordering::Less,
        (Some(l), Some(r)) => r.cmp(l),
    }
}

pub fn normalize_limit(value: Option<usize>, max: usize) -> Option<usize> {
    value.filter(|v| *v > 0).map(|v| v.min(max))
}

/// True when the caller asked for a source other than `name`; such queries
/// return empty instead of erroring so the router can fan out freely.
pub fn other_source_requested(query: &SourceQuery, name: &str) -> bool {
    matches!(
        query.source.as_deref().map(str::trim),
        Some(requested) if !requested.is_empty() && !requested.eq_ignore_ascii_case(name)
    )
}

pub fn shared_client() -> Result<reqwest::blocking::Client> {
    // An explicit timeout keeps a wedged feed from stalling a whole
    // ingest run.
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("pursuit/0.1")
        .build()?)
}

// --- Normalization helpers shared by the adapters ---

pub fn normalize_seniority(title: &str) -> &'static str {
    let normalized = title.to_lowercase();
    if normalized.contains("intern") {
        return "Intern";
    }
    if normalized.contains("junior") || normalized.contains("jr") {
        return "Junior";
    }
    if normalized.contains("senior") || normalized.contains("sr") {
        return "Senior";
    }
    if normalized.contains("staff")
        || normalized.contains("principal")
        || normalized.contains("lead")
    {
        return "Lead";
    }
    "Mid"
}

/// Feeds hand us tags as either an array or a comma-separated string.
pub fn tags_from_value(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(serde_json::Value::String(raw)) => raw
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Best-effort timestamp normalization to RFC 3339 UTC. Feeds mix RFC 3339,
/// RFC 2822 (RSS pubDate) and bare date/datetime strings.
pub fn parse_published_at(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(parsed.to_utc().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc2822(value) {
        return Some(parsed.to_utc().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(format!("{}Z", parsed.format("%Y-%m-%dT%H:%M:%S")));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(format!("{}Z", parsed.format("%Y-%m-%dT%H:%M:%S")));
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(format!("{}T00:00:00Z", parsed.format("%Y-%m-%d")));
    }
    None
}

pub fn strip_html(value: &str) -> String {
    let without_tags = regex::Regex::new(r"<[^>]*>")
        .map(|re| re.replace_all(value, " ").into_owned())
        .unwrap_or_else(|_| value.to_string());
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Include/exclude keyword gate over role + company + tags.
/// An empty include list admits everything not excluded.
pub fn passes_keyword_filter(record: &SourceRecord, include: &[&str], exclude: &[&str]) -> bool {
    let mut parts = vec![record.role.to_lowercase(), record.company.to_lowercase()];
    parts.extend(record.tags.iter().map(|tag| tag.to_lowercase()));
    let haystack = parts.join(" ");

    if exclude.iter().any(|keyword| haystack.contains(keyword)) {
        return false;
    }
    if include.is_empty() {
        return true;
    }
    include.iter().any(|keyword| haystack.contains(keyword))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn record(source: &str, external_id: &str, published_at: Option<&str>) -> SourceRecord {
        SourceRecord {
            external_id: external_id.to_string(),
            source: source.to_string(),
            role: "Frontend Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            seniority: "Mid".to_string(),
            tags: vec!["react".to_string()],
            description: None,
            source_url: "https://example.com/job".to_string(),
            published_at: published_at.map(|v| v.to_string()),
        }
    }

    struct FakeSource {
        name: &'static str,
        records: Vec<SourceRecord>,
    }

    impl JobSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn list(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
            if other_source_requested(query, self.name) {
                return Ok(Vec::new());
            }
            let mut records = self.records.clone();
            if let Some(limit) = query.limit {
                records.truncate(limit);
            }
            Ok(records)
        }
    }

    #[test]
    fn seniority_classification() {
        assert_eq!(normalize_seniority("Engineering Intern"), "Intern");
        assert_eq!(normalize_seniority("Junior Developer"), "Junior");
        assert_eq!(normalize_seniority("Sr. Frontend Engineer"), "Senior");
        assert_eq!(normalize_seniority("Staff Engineer"), "Lead");
        assert_eq!(normalize_seniority("Principal Designer"), "Lead");
        assert_eq!(normalize_seniority("Tech Lead"), "Lead");
        assert_eq!(normalize_seniority("Frontend Engineer"), "Mid");
    }

    #[test]
    fn tags_accept_arrays_and_comma_strings() {
        let array = serde_json::json!(["react", " css ", ""]);
        assert_eq!(tags_from_value(Some(&array)), vec!["react", "css"]);

        let string = serde_json::json!("react, css , ");
        assert_eq!(tags_from_value(Some(&string)), vec!["react", "css"]);

        assert!(tags_from_value(Some(&serde_json::json!(42))).is_empty());
        assert!(tags_from_value(None).is_empty());
    }

    #[test]
    fn published_at_accepts_common_feed_formats() {
        assert_eq!(
            parse_published_at("2026-02-01T10:00:00+02:00"),
            Some("2026-02-01T08:00:00Z".to_string())
        );
        assert_eq!(
            parse_published_at("Sun, 01 Feb 2026 10:00:00 GMT"),
            Some("2026-02-01T10:00:00Z".to_string())
        );
        assert_eq!(
            parse_published_at("2026-02-01T10:00:00"),
            Some("2026-02-01T10:00:00Z".to_string())
        );
        assert_eq!(
            parse_published_at("2026-02-01"),
            Some("2026-02-01T00:00:00Z".to_string())
        );
        assert_eq!(parse_published_at("yesterday"), None);
        assert_eq!(parse_published_at(""), None);
    }

    #[test]
    fn html_is_stripped_and_whitespace_collapsed() {
        assert_eq!(
            strip_html("<p>Build  <b>interfaces</b></p>\n<br/>remotely"),
            "Build interfaces remotely"
        );
    }

    #[test]
    fn keyword_filter_applies_exclude_before_include() {
        let mut rec = record("Remotive", "1", None);
        rec.role = "React Developer".to_string();
        assert!(passes_keyword_filter(&rec, &["react"], &["sales"]));

        rec.company = "Enterprise Sales Inc".to_string();
        assert!(!passes_keyword_filter(&rec, &["react"], &["sales"]));

        let plain = record("Remotive", "2", None);
        assert!(passes_keyword_filter(&plain, &[], &["sales"]));
        assert!(!passes_keyword_filter(&plain, &["rust"], &["sales"]));
    }

    #[test]
    fn router_merges_dedupes_sorts_and_truncates_after_merge() {
        let router = SourceRouter::new(vec![
            Box::new(FakeSource {
                name: "Remotive",
                records: vec![
                    record("Remotive", "a", Some("2026-02-03T00:00:00Z")),
                    record("Remotive", "b", None),
                ],
            }),
            Box::new(FakeSource {
                name: "WWR",
                records: vec![
                    record("WWR", "c", Some("2026-02-05T00:00:00Z")),
                    // Same key as the Remotive record: different source, kept.
                    record("WWR", "a", Some("2026-02-01T00:00:00Z")),
                    // True duplicate, dropped.
                    record("WWR", "c", Some("2026-02-05T00:00:00Z")),
                ],
            }),
        ]);

        let merged = router.list(&SourceQuery::default()).unwrap();
        let keys: Vec<_> = merged
            .iter()
            .map(|r| format!("{}:{}", r.source, r.external_id))
            .collect();
        assert_eq!(keys, vec!["WWR:c", "Remotive:a", "WWR:a", "Remotive:b"]);

        let limited = router
            .list(&SourceQuery {
                source: None,
                limit: Some(2),
            })
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].external_id, "c");
    }

    #[test]
    fn router_routes_single_source_and_ignores_unknown() {
        let router = SourceRouter::new(vec![Box::new(FakeSource {
            name: "Remotive",
            records: vec![record("Remotive", "a", None)],
        })]);

        let one = router
            .list(&SourceQuery {
                source: Some("remotive".to_string()),
                limit: None,
            })
            .unwrap();
        assert_eq!(one.len(), 1);

        let none = router
            .list(&SourceQuery {
                source: Some("LinkedIn".to_string()),
                limit: None,
            })
            .unwrap();
        assert!(none.is_empty());

        let all = router
            .list(&SourceQuery {
                source: Some("all".to_string()),
                limit: None,
            })
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn limits_are_normalized() {
        assert_eq!(normalize_limit(None, 100), None);
        assert_eq!(normalize_limit(Some(0), 100), None);
        assert_eq!(normalize_limit(Some(5), 100), Some(5));
        assert_eq!(normalize_limit(Some(500), 100), Some(100));
    }
}
