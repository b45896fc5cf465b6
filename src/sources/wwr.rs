use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};

use super::{
    normalize_limit, normalize_seniority, other_source_requested, parse_published_at,
    passes_keyword_filter, shared_client, strip_html, JobSource, SourceQuery, SourceRecord,
};

const SOURCE: &str = "WWR";
const FEED_URL: &str =
    "https://weworkremotely.com/categories/remote-front-end-programming-jobs.rss";
const MAX_LIMIT: usize = 50;

const EXCLUDE_KEYWORDS: &[&str] = &["sales", "marketing", "recruiter", "account executive"];

const ROLE_HINTS: &[&str] = &[
    "engineer",
    "developer",
    "designer",
    "product",
    "frontend",
    "front-end",
    "backend",
    "back-end",
    "full-stack",
    "full stack",
    "data",
    "qa",
    "ios",
    "android",
];

pub struct WwrSource {
    client: reqwest::blocking::Client,
}

impl WwrSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: shared_client()?,
        })
    }
}

fn split_on<'a>(value: &'a str, delimiter: &str) -> Option<(&'a str, &'a str)> {
    let index = value.find(delimiter)?;
    if index == 0 {
        return None;
    }
    Some((&value[..index], &value[index + delimiter.len()..]))
}

/// Feed titles come in a few shapes: `Company: Role`, `Role at Company`,
/// and `Something - Something` where either side can be the role.
pub fn parse_title(title: &str) -> (String, String) {
    let cleaned = title.trim();
    if cleaned.is_empty() {
        return ("Unknown role".to_string(), "Unknown".to_string());
    }

    if let Some((company, role)) = split_on(cleaned, ":") {
        let company = company.trim();
        let role = role.trim();
        return (
            if role.is_empty() { cleaned } else { role }.to_string(),
            if company.is_empty() { "Unknown" } else { company }.to_string(),
        );
    }

    let lower = cleaned.to_lowercase();
    if let Some(at_index) = lower.rfind(" at ") {
        if at_index > 0 {
            let role = cleaned[..at_index].trim();
            let company = cleaned[at_index + 4..].trim();
            return (
                if role.is_empty() { cleaned } else { role }.to_string(),
                if company.is_empty() { "Unknown" } else { company }.to_string(),
            );
        }
    }

    if let Some((left, right)) = split_on(cleaned, " - ") {
        let left = left.trim();
        let right = right.trim();
        let left_lower = left.to_lowercase();
        let left_looks_role = ROLE_HINTS.iter().any(|hint| left_lower.contains(hint));
        return if left_looks_role {
            (
                if left.is_empty() { cleaned } else { left }.to_string(),
                if right.is_empty() { "Unknown" } else { right }.to_string(),
            )
        } else {
            (
                if right.is_empty() { cleaned } else { right }.to_string(),
                if left.is_empty() { "Unknown" } else { left }.to_string(),
            )
        };
    }

    (cleaned.to_string(), "Unknown".to_string())
}

pub fn extract_location(description: &str) -> Option<String> {
    let text = strip_html(description);
    let re = regex::Regex::new(r"(?i)location:\s*([^|•\n]+)").ok()?;
    re.captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn item_text(item: scraper::ElementRef, selector: &Selector) -> Option<String> {
    item.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Parses the feed with the HTML parser. Inside an HTML parse `<link>` is a
/// void element and its URL becomes loose text, so the posting URL is taken
/// from `<guid>`, which this feed fills with the permalink.
pub fn parse_feed(xml: &str) -> Vec<SourceRecord> {
    let document = Html::parse_document(xml);

    let item_selector = match Selector::parse("item") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };
    let title_selector = Selector::parse("title").ok();
    let guid_selector = Selector::parse("guid").ok();
    let date_selector = Selector::parse("pubdate").ok();
    let description_selector = Selector::parse("description").ok();
    let category_selector = Selector::parse("category").ok();

    let mut records = Vec::new();
    for item in document.select(&item_selector) {
        let Some(title) = title_selector.as_ref().and_then(|s| item_text(item, s)) else {
            continue;
        };
        let Some(guid) = guid_selector.as_ref().and_then(|s| item_text(item, s)) else {
            continue;
        };

        let raw_description = description_selector.as_ref().and_then(|s| item_text(item, s));
        let description = raw_description.as_deref().map(strip_html);
        let categories: Vec<String> = category_selector
            .as_ref()
            .map(|selector| {
                item.select(selector)
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .filter(|text| !text.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let (role, company) = parse_title(&title);
        let location = raw_description
            .as_deref()
            .and_then(extract_location)
            .unwrap_or_else(|| "Remote".to_string());

        records.push(SourceRecord {
            external_id: guid.clone(),
            source: SOURCE.to_string(),
            role,
            company,
            location,
            seniority: normalize_seniority(&title).to_string(),
            tags: categories,
            description,
            source_url: guid,
            published_at: date_selector
                .as_ref()
                .and_then(|s| item_text(item, s))
                .as_deref()
                .and_then(parse_published_at),
        });
    }
    records
}

impl JobSource for WwrSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn list(&self, query: &SourceQuery) -> Result<Vec<SourceRecord>> {
        if other_source_requested(query, SOURCE) {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(FEED_URL)
            .send()
            .context("Failed to fetch WWR jobs")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "WWR request failed with status {}",
                response.status()
            ));
        }

        let xml = response.text().context("Failed to read WWR feed body")?;
        let items = parse_feed(&xml);

        if items.is_empty() {
            tracing::warn!(url = FEED_URL, bytes = xml.len(), "WWR feed parsed to 0 items");
            return Ok(Vec::new());
        }

        let records: Vec<SourceRecord> = items
            .into_iter()
            .filter(|record| passes_keyword_filter(record, &[], EXCLUDE_KEYWORDS))
            .collect();

        if records.is_empty() {
            tracing::warn!(url = FEED_URL, "WWR feed had items but all were filtered out");
        }

        let mut records = records;
        if let Some(limit) = normalize_limit(query.limit, MAX_LIMIT) {
            records.truncate(limit);
        }
        Ok(records)
    }
}
