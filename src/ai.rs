use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Job, Provider, TriageStatus, UserProfile};

// --- Decisions ---

#[derive(Debug, Clone, PartialEq)]
pub struct TriageDecision {
    pub status: TriageStatus,
    pub reasons: Vec<String>,
    pub provider: Provider,
    pub confidence: Option<f64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankDecision {
    pub score: i64,
    pub reason: String,
    pub provider: Provider,
}

// --- Ports ---

/// Two-stage classification seam. `coarse` errors are fatal for a triage
/// batch; `disambiguate` degrades every failure to `None` so the coarse
/// decision can stand.
pub trait JobTriage {
    fn coarse(&self, job: &Job, profile: &UserProfile) -> Result<Option<TriageDecision>>;
    fn disambiguate(
        &self,
        job: &Job,
        profile: &UserProfile,
        previous: &TriageDecision,
    ) -> Result<Option<TriageDecision>>;
    fn disambiguation_available(&self) -> bool;
}

pub trait JobRanker {
    fn provider(&self) -> Provider;
    fn rank(&self, job: &Job, profile: &UserProfile) -> Result<Option<RankDecision>>;
}

// --- Prompts ---

const TRIAGE_DESCRIPTION_LIMIT: usize = 1200;
const RANK_DESCRIPTION_LIMIT: usize = 1400;

fn trim_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut trimmed: String = value.chars().take(max_chars).collect();
    trimmed.push_str("...");
    trimmed
}

pub fn build_profile_text(profile: &UserProfile) -> String {
    let mut parts = vec![
        format!("must_have: {}", profile.must_have_keywords.join(", ")),
        format!("hard_no: {}", profile.hard_no_keywords.join(", ")),
        format!("preferred: {}", profile.preferred_keywords.join(", ")),
        format!("excluded: {}", profile.excluded_keywords.join(", ")),
    ];
    if !profile.notes.is_empty() {
        parts.push(format!("notes: {}", profile.notes));
    }
    parts.join("\n")
}

pub fn build_job_text(job: &Job, description_limit: usize) -> String {
    let description = job
        .description
        .as_deref()
        .map(|value| trim_text(value, description_limit))
        .unwrap_or_else(|| "none".to_string());
    [
        format!("role: {}", job.role),
        format!("company: {}", job.company),
        format!("location: {}", job.location),
        format!("seniority: {}", job.seniority),
        format!("tags: {}", job.tags.join(", ")),
        format!("description: {}", description),
    ]
    .join("\n")
}

pub fn build_coarse_prompt(job: &Job, profile: &UserProfile) -> String {
    format!(
        "You are a job triage assistant.\n\
         Return JSON only in the form:\n\
         {{\"decision\":\"shortlist|maybe|reject\",\"confidence\":0.0,\
         \"reasons\":[\"reason 1\",\"reason 2\"],\"tags\":[\"tag 1\",\"tag 2\"]}}\n\n\
         User profile:\n{}\n\n\
         Job:\n{}\n",
        build_profile_text(profile),
        build_job_text(job, TRIAGE_DESCRIPTION_LIMIT)
    )
}

pub fn build_disambiguation_prompt(
    job: &Job,
    profile: &UserProfile,
    previous: &TriageDecision,
) -> String {
    format!(
        "You are a job triage assistant.\n\
         Return JSON only in the form:\n\
         {{\"finalDecision\":\"shortlist|maybe|reject\",\"fitScore\":0,\
         \"reasons\":[\"reason 1\",\"reason 2\"],\"dealbreakers\":[\"dealbreaker 1\"],\
         \"matchedSkills\":[\"skill 1\"],\"missingSkills\":[\"skill 1\"],\
         \"recommendedNextAction\":\"short suggestion\"}}\n\n\
         Previous decision: {}\n\n\
         User profile:\n{}\n\n\
         Job:\n{}\n",
        previous.status.as_str(),
        build_profile_text(profile),
        build_job_text(job, TRIAGE_DESCRIPTION_LIMIT)
    )
}

pub fn build_rank_prompt(job: &Job, profile: &UserProfile) -> String {
    format!(
        "You are a job ranking assistant.\n\
         Return JSON only in the form:\n\
         {{\"score\":0,\"reason\":\"short explanation\"}}\n\n\
         Score range: 0-100 where 100 is an outstanding fit. Reason should be concise.\n\n\
         User profile:\n{}\n\n\
         Job:\n{}\n",
        build_profile_text(profile),
        build_job_text(job, RANK_DESCRIPTION_LIMIT)
    )
}

// --- Tolerant decoding of model output ---

/// Best-effort structured decode: full JSON parse first, then the widest
/// `{...}` substring. Never errors; garbage in, `None` out.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    let re = Regex::new(r"(?s)\{.*\}").ok()?;
    let candidate = re.find(text)?;
    serde_json::from_str(candidate.as_str()).ok()
}

fn number_from(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_confidence(value: Option<&Value>) -> Option<f64> {
    number_from(value)
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn normalize_fit_score(value: Option<&Value>) -> Option<f64> {
    number_from(value)
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 100.0))
}

/// Below this the coarse pass is not trusted with a final answer.
pub const COARSE_CONFIDENCE_FLOOR: f64 = 0.75;

/// Normalizes a coarse (ollama) payload. A decision without confidence, or
/// below the floor, is demoted to `maybe` so it escalates.
pub fn parse_coarse_payload(value: &Value) -> Option<TriageDecision> {
    let decision_raw = value
        .get("decision")
        .and_then(Value::as_str)
        .or_else(|| value.get("status").and_then(Value::as_str))?;
    let decision = TriageStatus::parse(decision_raw)?;
    let confidence = normalize_confidence(value.get("confidence"));
    let status = match confidence {
        Some(c) if c >= COARSE_CONFIDENCE_FLOOR => decision,
        _ => TriageStatus::Maybe,
    };
    Some(TriageDecision {
        status,
        reasons: string_list(value.get("reasons")),
        provider: Provider::Ollama,
        confidence,
        tags: string_list(value.get("tags")),
    })
}

pub fn parse_disambiguation_payload(value: &Value) -> Option<TriageDecision> {
    let decision = TriageStatus::parse(value.get("finalDecision").and_then(Value::as_str)?)?;
    let fit_score = normalize_fit_score(value.get("fitScore"));
    let matched_skills = string_list(value.get("matchedSkills"));

    let mut reasons = string_list(value.get("reasons"));
    reasons.extend(
        string_list(value.get("dealbreakers"))
            .into_iter()
            .map(|reason| format!("Dealbreaker: {reason}")),
    );
    reasons.extend(
        string_list(value.get("missingSkills"))
            .into_iter()
            .map(|skill| format!("Missing skill: {skill}")),
    );
    reasons.extend(
        matched_skills
            .iter()
            .map(|skill| format!("Skill match: {skill}")),
    );
    if let Some(action) = value
        .get("recommendedNextAction")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|action| !action.is_empty())
    {
        reasons.push(format!("Next action: {action}"));
    }

    Some(TriageDecision {
        status: decision,
        reasons,
        provider: Provider::OpenAi,
        confidence: fit_score.map(|score| score / 100.0),
        tags: matched_skills,
    })
}

pub fn parse_rank_payload(value: &Value, provider: Provider) -> Option<RankDecision> {
    let score = number_from(value.get("score")).filter(|v| v.is_finite())?;
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|reason| !reason.is_empty())?;
    Some(RankDecision {
        score: (score.round() as i64).clamp(0, 100),
        reason: reason.to_string(),
        provider,
    })
}

// --- Ollama provider ---

fn provider_client() -> Result<reqwest::blocking::Client> {
    // A hung provider should fail the call, not wedge the whole batch.
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?)
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: Option<String>,
}

#[derive(Debug)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Result<Self> {
        Ok(Self {
            base_url,
            model,
            client: provider_client()?,
        })
    }

    /// `Err` means the endpoint itself failed (unreachable, non-2xx);
    /// `Ok(None)` means it answered with something we can't use.
    pub fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .context("Ollama is unreachable")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status {}",
                response.status()
            ));
        }

        let body: OllamaGenerateResponse = match response.json() {
            Ok(body) => body,
            Err(_) => return Ok(None),
        };
        Ok(body.response.filter(|text| !text.trim().is_empty()))
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/responses";

#[derive(Debug)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            api_key,
            model,
            client: provider_client()?,
        })
    }

    pub fn respond(&self, input: &str, response_format: Option<Value>) -> Result<Option<String>> {
        let mut body = json!({
            "model": self.model,
            "input": input,
        });
        if let Some(format) = response_format {
            body["response_format"] = format;
        }

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "OpenAI API request failed with status {}",
                response.status()
            ));
        }

        let value: Value = match response.json() {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };
        let text = value
            .get("output_text")
            .and_then(Value::as_str)
            .or_else(|| {
                value
                    .get("output")
                    .and_then(|output| output.get(0))
                    .and_then(|entry| entry.get("content"))
                    .and_then(|content| content.get(0))
                    .and_then(|block| block.get("text"))
                    .and_then(Value::as_str)
            })
            .map(|text| text.to_string())
            .filter(|text| !text.is_empty());
        Ok(text)
    }
}

fn disambiguation_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "job_triage_disambiguation",
            "strict": true,
            "schema": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "finalDecision": {
                        "type": "string",
                        "enum": ["shortlist", "maybe", "reject"],
                    },
                    "fitScore": { "type": "number", "minimum": 0, "maximum": 100 },
                    "reasons": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                    },
                    "dealbreakers": { "type": "array", "items": { "type": "string" } },
                    "matchedSkills": { "type": "array", "items": { "type": "string" } },
                    "missingSkills": { "type": "array", "items": { "type": "string" } },
                    "recommendedNextAction": { "type": "string" },
                },
                "required": [
                    "finalDecision",
                    "fitScore",
                    "reasons",
                    "dealbreakers",
                    "matchedSkills",
                    "missingSkills",
                    "recommendedNextAction",
                ],
            },
        },
    })
}

fn rank_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "job_rank",
            "strict": true,
            "schema": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "score": { "type": "number", "minimum": 0, "maximum": 100 },
                    "reason": { "type": "string" },
                },
                "required": ["score", "reason"],
            },
        },
    })
}

// --- Concrete port implementations ---

pub struct LlmTriage {
    ollama: Option<OllamaClient>,
    openai: Option<OpenAiClient>,
}

impl LlmTriage {
    pub fn from_config(config: &Config) -> Result<Self> {
        let ollama = match (&config.ollama_base_url, &config.ollama_model) {
            (Some(base_url), Some(model)) => {
                Some(OllamaClient::new(base_url.clone(), model.clone())?)
            }
            _ => None,
        };
        let openai = match (&config.openai_api_key, &config.openai_model) {
            (Some(api_key), Some(model)) => {
                Some(OpenAiClient::new(api_key.clone(), model.clone())?)
            }
            _ => None,
        };
        Ok(Self { ollama, openai })
    }
}

impl JobTriage for LlmTriage {
    fn coarse(&self, job: &Job, profile: &UserProfile) -> Result<Option<TriageDecision>> {
        let Some(ollama) = &self.ollama else {
            // No local model configured: the job is skipped, not failed.
            return Ok(None);
        };
        let prompt = build_coarse_prompt(job, profile);
        let Some(text) = ollama.generate(&prompt)? else {
            return Ok(None);
        };
        Ok(extract_json(&text)
            .as_ref()
            .and_then(parse_coarse_payload))
    }

    fn disambiguate(
        &self,
        job: &Job,
        profile: &UserProfile,
        previous: &TriageDecision,
    ) -> Result<Option<TriageDecision>> {
        let Some(openai) = &self.openai else {
            return Ok(None);
        };
        let prompt = build_disambiguation_prompt(job, profile, previous);
        match openai.respond(&prompt, Some(disambiguation_response_format())) {
            Ok(Some(text)) => Ok(extract_json(&text)
                .as_ref()
                .and_then(parse_disambiguation_payload)),
            Ok(None) => Ok(None),
            Err(error) => {
                tracing::warn!(job_id = job.id, error = %error, "disambiguation call failed; keeping coarse decision");
                Ok(None)
            }
        }
    }

    fn disambiguation_available(&self) -> bool {
        self.openai.is_some()
    }
}

pub struct LlmRanker {
    provider: Provider,
    ollama: Option<OllamaClient>,
    openai: Option<OpenAiClient>,
}

impl LlmRanker {
    /// The ranking provider is a hard precondition: resolved once from
    /// configuration, with a descriptive error when its endpoint or
    /// credentials are missing.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let provider = config.rank_provider.clone().map_err(|raw| {
            AppError::provider(format!(
                "Unknown RANK_PROVIDER '{raw}'; set it to 'ollama' or 'openai'."
            ))
        })?;

        match provider {
            Provider::Ollama => {
                let (Some(base_url), Some(model)) =
                    (&config.ollama_base_url, &config.ollama_model)
                else {
                    return Err(AppError::provider(
                        "Ranking with ollama needs OLLAMA_BASE_URL and OLLAMA_MODEL.",
                    ));
                };
                Ok(Self {
                    provider,
                    ollama: Some(
                        OllamaClient::new(base_url.clone(), model.clone())
                            .map_err(AppError::Internal)?,
                    ),
                    openai: None,
                })
            }
            Provider::OpenAi => {
                let (Some(api_key), Some(model)) =
                    (&config.openai_api_key, &config.openai_model)
                else {
                    return Err(AppError::provider(
                        "Ranking with openai needs OPENAI_API_KEY and OPENAI_MODEL.",
                    ));
                };
                Ok(Self {
                    provider,
                    ollama: None,
                    openai: Some(
                        OpenAiClient::new(api_key.clone(), model.clone())
                            .map_err(AppError::Internal)?,
                    ),
                })
            }
        }
    }
}

impl JobRanker for LlmRanker {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn rank(&self, job: &Job, profile: &UserProfile) -> Result<Option<RankDecision>> {
        let prompt = build_rank_prompt(job, profile);
        let text = match self.provider {
            Provider::Ollama => {
                let ollama = self
                    .ollama
                    .as_ref()
                    .ok_or_else(|| anyhow!("Ollama client missing"))?;
                ollama.generate(&prompt)?
            }
            Provider::OpenAi => {
                let openai = self
                    .openai
                    .as_ref()
                    .ok_or_else(|| anyhow!("OpenAI client missing"))?;
                openai.respond(&prompt, Some(rank_response_format()))?
            }
        };
        Ok(text
            .as_deref()
            .and_then(extract_json)
            .and_then(|value| parse_rank_payload(&value, self.provider)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job {
            id: 1,
            external_id: Some("x1".to_string()),
            source: "Remotive".to_string(),
            role: "Frontend Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            seniority: "Mid".to_string(),
            tags: vec!["react".to_string(), "css".to_string()],
            description: Some("Build interfaces with React.".to_string()),
            source_url: None,
            published_at: None,
            triage_status: None,
            triage_reasons: vec![],
            triaged_at: None,
            triage_provider: None,
            triage_version: None,
            rank_score: None,
            rank_reason: None,
            rank_provider: None,
            rank_version: None,
            created_at: "2026-01-10T08:00:00Z".to_string(),
            updated_at: "2026-01-10T08:00:00Z".to_string(),
        }
    }

    #[test]
    fn extract_json_handles_clean_and_embedded_payloads() {
        assert!(extract_json(r#"{"decision":"maybe"}"#).is_some());

        let chatty = "Sure! Here's my answer:\n{\"decision\": \"reject\",\n\"reasons\": []}\nHope that helps.";
        let value = extract_json(chatty).unwrap();
        assert_eq!(value["decision"], "reject");

        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{broken json").is_none());
    }

    #[test]
    fn coarse_decision_with_high_confidence_is_final() {
        let value = serde_json::json!({
            "decision": "shortlist",
            "confidence": 0.9,
            "reasons": ["strong react match"],
            "tags": ["react"],
        });
        let decision = parse_coarse_payload(&value).unwrap();
        assert_eq!(decision.status, TriageStatus::Shortlist);
        assert_eq!(decision.confidence, Some(0.9));
        assert_eq!(decision.provider, Provider::Ollama);
    }

    #[test]
    fn low_or_missing_confidence_demotes_to_maybe() {
        let low = serde_json::json!({"decision": "reject", "confidence": 0.5});
        assert_eq!(
            parse_coarse_payload(&low).unwrap().status,
            TriageStatus::Maybe
        );

        let missing = serde_json::json!({"decision": "shortlist"});
        assert_eq!(
            parse_coarse_payload(&missing).unwrap().status,
            TriageStatus::Maybe
        );

        // Confidence can arrive as a string; it is still honored.
        let stringly = serde_json::json!({"decision": "shortlist", "confidence": "0.8"});
        assert_eq!(
            parse_coarse_payload(&stringly).unwrap().status,
            TriageStatus::Shortlist
        );
    }

    #[test]
    fn coarse_payload_accepts_status_alias_and_rejects_garbage() {
        let alias = serde_json::json!({"status": "maybe"});
        assert_eq!(
            parse_coarse_payload(&alias).unwrap().status,
            TriageStatus::Maybe
        );

        assert!(parse_coarse_payload(&serde_json::json!({"decision": "keep"})).is_none());
        assert!(parse_coarse_payload(&serde_json::json!({})).is_none());
    }

    #[test]
    fn disambiguation_concatenates_reasons_and_derives_confidence() {
        let value = serde_json::json!({
            "finalDecision": "shortlist",
            "fitScore": 82,
            "reasons": ["good overlap"],
            "dealbreakers": ["on-call"],
            "matchedSkills": ["react"],
            "missingSkills": ["graphql"],
            "recommendedNextAction": "Apply this week",
        });
        let decision = parse_disambiguation_payload(&value).unwrap();
        assert_eq!(decision.status, TriageStatus::Shortlist);
        assert_eq!(decision.provider, Provider::OpenAi);
        assert_eq!(decision.confidence, Some(0.82));
        assert_eq!(decision.tags, vec!["react"]);
        assert_eq!(
            decision.reasons,
            vec![
                "good overlap",
                "Dealbreaker: on-call",
                "Missing skill: graphql",
                "Skill match: react",
                "Next action: Apply this week",
            ]
        );
    }

    #[test]
    fn disambiguation_requires_a_valid_final_decision() {
        assert!(parse_disambiguation_payload(&serde_json::json!({"fitScore": 50})).is_none());
        assert!(
            parse_disambiguation_payload(&serde_json::json!({"finalDecision": "punt"})).is_none()
        );
    }

    #[test]
    fn rank_scores_are_rounded_and_clamped() {
        let value = serde_json::json!({"score": 87.6, "reason": "solid fit"});
        let decision = parse_rank_payload(&value, Provider::Ollama).unwrap();
        assert_eq!(decision.score, 88);

        let high = serde_json::json!({"score": 250, "reason": "keen"});
        assert_eq!(parse_rank_payload(&high, Provider::Ollama).unwrap().score, 100);

        let negative = serde_json::json!({"score": -3, "reason": "bad"});
        assert_eq!(parse_rank_payload(&negative, Provider::Ollama).unwrap().score, 0);

        let stringly = serde_json::json!({"score": "64", "reason": "fine"});
        assert_eq!(parse_rank_payload(&stringly, Provider::OpenAi).unwrap().score, 64);
    }

    #[test]
    fn rank_requires_a_nonempty_reason() {
        assert!(parse_rank_payload(&serde_json::json!({"score": 50}), Provider::Ollama).is_none());
        assert!(parse_rank_payload(
            &serde_json::json!({"score": 50, "reason": "  "}),
            Provider::Ollama
        )
        .is_none());
    }

    #[test]
    fn prompts_carry_profile_and_job_blocks() {
        let mut profile = UserProfile::default();
        profile.must_have_keywords = vec!["react".to_string()];
        profile.notes = "remote only".to_string();
        let job = sample_job();

        let prompt = build_coarse_prompt(&job, &profile);
        assert!(prompt.contains("must_have: react"));
        assert!(prompt.contains("notes: remote only"));
        assert!(prompt.contains("role: Frontend Engineer"));
        assert!(prompt.contains("tags: react, css"));

        let rank_prompt = build_rank_prompt(&job, &profile);
        assert!(rank_prompt.contains("\"score\":0"));
    }

    #[test]
    fn long_descriptions_are_trimmed_on_char_boundaries() {
        let trimmed = trim_text(&"é".repeat(2000), 1200);
        assert!(trimmed.ends_with("..."));
        assert_eq!(trimmed.chars().count(), 1203);

        assert_eq!(trim_text("short", 1200), "short");
    }

    #[test]
    fn missing_description_renders_as_none() {
        let mut job = sample_job();
        job.description = None;
        assert!(build_job_text(&job, TRIAGE_DESCRIPTION_LIMIT).contains("description: none"));
    }
}
