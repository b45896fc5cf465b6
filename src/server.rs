use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::ai::{LlmRanker, LlmTriage};
use crate::apps::{self, NewApplicationInput, UpdateApplicationInput};
use crate::budget::DailyBudget;
use crate::config::Config;
use crate::db::{ApplicationFilter, Database, JobFilter, JobOrder, TriageFilter};
use crate::errors::AppError;
use crate::ingest;
use crate::jobs::{self, ManualJobInput, ManualJobOutcome};
use crate::models::{
    Application, ApplicationLogEntry, ApplicationStatus, Job, Priority, TriageStatus,
};
use crate::profile;
use crate::rank::{self, RankOutcome};
use crate::sources::{SourceQuery, SourceRouter};
use crate::triage::{self, TriageInput, TriageMode, TriageOutcome};

/// Shared server state. The core is blocking (`rusqlite`, blocking
/// reqwest), so handlers run it in `spawn_blocking` behind mutexes; the
/// disambiguation budget lives here for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub budget: Arc<Mutex<DailyBudget>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            budget: Arc::new(Mutex::new(DailyBudget::new(config.openai_daily_cap))),
            config: Arc::new(config),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::JobNotFound(_) | AppError::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::CapReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({ "ok": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct OkBody<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<OkBody<T>> {
    Json(OkBody { ok: true, body })
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal(anyhow!("{what} lock poisoned")))
}

async fn blocking<T, F>(task: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result,
        Err(error) => Err(AppError::Internal(anyhow!("blocking task failed: {error}"))),
    }
}

// --- Request/response shapes ---

#[derive(Deserialize)]
struct IngestQuery {
    source: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TriageRequest {
    mode: Option<String>,
    days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RankRequest {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct JobsQuery {
    search: Option<String>,
    seniority: Option<String>,
    source: Option<String>,
    /// Comma-separated; every listed tag must be present.
    tags: Option<String>,
    /// `untriaged` or a concrete triage status.
    triage: Option<String>,
    /// `updated_at` (default), `published_at`, or `rank_score`.
    order: Option<String>,
    asc: Option<bool>,
    offset: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct JobsBody {
    items: Vec<Job>,
    total: i64,
}

#[derive(Serialize)]
struct JobBody {
    job: Job,
}

#[derive(Default, Deserialize)]
struct ManualJobRequest {
    role: Option<String>,
    company: Option<String>,
    source_url: Option<String>,
    location: Option<String>,
    seniority: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    description: Option<String>,
    published_at: Option<String>,
    auto_triage: Option<bool>,
}

#[derive(Deserialize)]
struct ApplicationsQuery {
    search: Option<String>,
    status: Option<String>,
    priority: Option<String>,
}

#[derive(Serialize)]
struct ApplicationsBody {
    items: Vec<Application>,
}

#[derive(Serialize)]
struct ApplicationBody {
    application: Application,
}

#[derive(Serialize)]
struct ApplicationDetailBody {
    application: Application,
    log: Vec<ApplicationLogEntry>,
}

#[derive(Default, Deserialize)]
struct NewApplicationRequest {
    company: Option<String>,
    role: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    next_action_at: Option<String>,
    source: Option<String>,
    notes: Option<String>,
}

/// `next_action_at` distinguishes an absent field (leave alone) from an
/// explicit `null` (clear the follow-up).
#[derive(Default, Deserialize)]
struct UpdateApplicationRequest {
    status: Option<String>,
    priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    next_action_at: Option<Option<String>>,
    notes: Option<String>,
}

#[derive(Serialize)]
struct SourcesBody {
    sources: Vec<String>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn parse_triage_filter(value: &str) -> Result<TriageFilter, AppError> {
    if value.trim().eq_ignore_ascii_case("untriaged") {
        return Ok(TriageFilter::Untriaged);
    }
    TriageStatus::parse(value)
        .map(TriageFilter::Status)
        .ok_or_else(|| AppError::validation(format!("Unknown triage filter: {value}")))
}

fn parse_job_order(value: &str) -> Result<JobOrder, AppError> {
    match value.trim().to_lowercase().as_str() {
        "updated_at" => Ok(JobOrder::UpdatedAt),
        "published_at" => Ok(JobOrder::PublishedAt),
        "rank_score" => Ok(JobOrder::RankScore),
        other => Err(AppError::validation(format!("Unknown order: {other}"))),
    }
}

fn parse_application_status(value: &str) -> Result<ApplicationStatus, AppError> {
    ApplicationStatus::parse(value)
        .ok_or_else(|| AppError::validation(format!("Unknown status: {value}")))
}

fn parse_priority(value: &str) -> Result<Priority, AppError> {
    Priority::parse(value).ok_or_else(|| AppError::validation(format!("Unknown priority: {value}")))
}

fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// --- Handlers ---

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn ingest_handler(
    State(state): State<AppState>,
    Query(query): Query<IngestQuery>,
) -> Result<Json<OkBody<ingest::IngestOutcome>>, AppError> {
    let outcome = blocking(move || {
        let router = SourceRouter::from_config(&state.config)?;
        let since = ingest::start_of_today(Local::now());
        let db = lock(&state.db, "database")?;
        ingest::ingest_jobs(
            &db,
            &router,
            state.config.ingest_daily_cap,
            &SourceQuery {
                source: query.source,
                limit: query.limit,
            },
            Utc::now(),
            &since,
        )
    })
    .await?;
    Ok(ok(outcome))
}

async fn ingest_status_handler(
    State(state): State<AppState>,
) -> Result<Json<OkBody<ingest::IngestStatus>>, AppError> {
    let status = blocking(move || {
        let since = ingest::start_of_today(Local::now());
        let db = lock(&state.db, "database")?;
        ingest::ingest_status(&db, state.config.ingest_daily_cap, &since)
    })
    .await?;
    Ok(ok(status))
}

async fn triage_handler(
    State(state): State<AppState>,
    body: Option<Json<TriageRequest>>,
) -> Result<Json<OkBody<TriageOutcome>>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let outcome = blocking(move || {
        let triage = LlmTriage::from_config(&state.config)?;
        let profile = profile::load_profile(state.config.profile_path.as_deref())?;
        let db = lock(&state.db, "database")?;
        let mut budget = lock(&state.budget, "budget")?;
        triage::triage_jobs(
            &db,
            &triage,
            &profile,
            &mut budget,
            Utc::now(),
            TriageInput {
                mode: TriageMode::parse(request.mode.as_deref().unwrap_or("")),
                days: request.days,
            },
        )
    })
    .await?;
    Ok(ok(outcome))
}

async fn rank_handler(
    State(state): State<AppState>,
    body: Option<Json<RankRequest>>,
) -> Result<Json<OkBody<RankOutcome>>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let outcome = blocking(move || {
        let ranker = LlmRanker::from_config(&state.config)?;
        let profile = profile::load_profile(state.config.profile_path.as_deref())?;
        let db = lock(&state.db, "database")?;
        rank::rank_shortlist(&db, &ranker, &profile, request.limit, Utc::now())
    })
    .await?;
    Ok(ok(outcome))
}

async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<OkBody<JobsBody>>, AppError> {
    let filter = JobFilter {
        search: query.search.clone(),
        seniority: query.seniority.clone(),
        source: query.source.clone(),
        tags: split_tags(query.tags.as_deref()),
        triage: query
            .triage
            .as_deref()
            .map(parse_triage_filter)
            .transpose()?,
    };
    let order = query
        .order
        .as_deref()
        .map(parse_job_order)
        .transpose()?
        .unwrap_or(JobOrder::UpdatedAt);
    let ascending = query.asc.unwrap_or(false);
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(50);

    let (items, total) = blocking(move || {
        let db = lock(&state.db, "database")?;
        Ok(db.list_jobs_page(&filter, order, ascending, offset, limit)?)
    })
    .await?;
    Ok(ok(JobsBody { items, total }))
}

async fn get_job_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OkBody<JobBody>>, AppError> {
    let job = blocking(move || {
        let db = lock(&state.db, "database")?;
        db.get_job(id)?.ok_or(AppError::JobNotFound(id))
    })
    .await?;
    Ok(ok(JobBody { job }))
}

async fn create_manual_job_handler(
    State(state): State<AppState>,
    body: Option<Json<ManualJobRequest>>,
) -> Result<Json<OkBody<ManualJobOutcome>>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let outcome = blocking(move || {
        let triage = LlmTriage::from_config(&state.config)?;
        let profile = profile::load_profile(state.config.profile_path.as_deref())?;
        let db = lock(&state.db, "database")?;
        jobs::create_manual_job(
            &db,
            &triage,
            &profile,
            ManualJobInput {
                role: request.role.unwrap_or_default(),
                company: request.company.unwrap_or_default(),
                source_url: request.source_url,
                location: request.location,
                seniority: request.seniority,
                tags: request.tags,
                description: request.description,
                published_at: request.published_at,
                auto_triage: request.auto_triage,
            },
            Utc::now(),
        )
    })
    .await?;
    Ok(ok(outcome))
}

async fn save_job_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OkBody<ApplicationBody>>, AppError> {
    let application = blocking(move || {
        let db = lock(&state.db, "database")?;
        apps::save_job_as_application(&db, id, Local::now())
    })
    .await?;
    Ok(ok(ApplicationBody { application }))
}

async fn list_applications_handler(
    State(state): State<AppState>,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Json<OkBody<ApplicationsBody>>, AppError> {
    let filter = ApplicationFilter {
        search: query.search.clone(),
        status: query
            .status
            .as_deref()
            .map(parse_application_status)
            .transpose()?,
        priority: query.priority.as_deref().map(parse_priority).transpose()?,
        ..Default::default()
    };
    let items = blocking(move || {
        let db = lock(&state.db, "database")?;
        Ok(db.list_applications(&filter)?)
    })
    .await?;
    Ok(ok(ApplicationsBody { items }))
}

async fn create_application_handler(
    State(state): State<AppState>,
    body: Option<Json<NewApplicationRequest>>,
) -> Result<Json<OkBody<ApplicationBody>>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let input = NewApplicationInput {
        company: request.company.unwrap_or_default(),
        role: request.role.unwrap_or_default(),
        status: request
            .status
            .as_deref()
            .map(parse_application_status)
            .transpose()?,
        priority: request.priority.as_deref().map(parse_priority).transpose()?,
        next_action_at: request.next_action_at,
        source: request.source,
        notes: request.notes,
    };
    let application = blocking(move || {
        let db = lock(&state.db, "database")?;
        apps::create_application(&db, input, Local::now())
    })
    .await?;
    Ok(ok(ApplicationBody { application }))
}

async fn get_application_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OkBody<ApplicationDetailBody>>, AppError> {
    let detail = blocking(move || {
        let db = lock(&state.db, "database")?;
        let application = db
            .get_application(id)?
            .ok_or(AppError::ApplicationNotFound(id))?;
        let log = db.list_application_logs(id, None)?;
        Ok(ApplicationDetailBody { application, log })
    })
    .await?;
    Ok(ok(detail))
}

async fn update_application_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<UpdateApplicationRequest>>,
) -> Result<Json<OkBody<ApplicationBody>>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let input = UpdateApplicationInput {
        id,
        status: request
            .status
            .as_deref()
            .map(parse_application_status)
            .transpose()?,
        priority: request.priority.as_deref().map(parse_priority).transpose()?,
        next_action_at: request.next_action_at,
        notes: request.notes,
    };
    let application = blocking(move || {
        let db = lock(&state.db, "database")?;
        apps::update_application(&db, input, Local::now())
    })
    .await?;
    Ok(ok(ApplicationBody { application }))
}

async fn archive_application_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OkBody<ApplicationBody>>, AppError> {
    let application = blocking(move || {
        let db = lock(&state.db, "database")?;
        apps::archive_application(&db, id, Local::now())
    })
    .await?;
    Ok(ok(ApplicationBody { application }))
}

async fn inbox_handler(
    State(state): State<AppState>,
) -> Result<Json<OkBody<apps::InboxGroups>>, AppError> {
    let groups = blocking(move || {
        let db = lock(&state.db, "database")?;
        apps::list_inbox(&db, &apps::date_only(Local::now()))
    })
    .await?;
    Ok(ok(groups))
}

async fn sources_handler(
    State(state): State<AppState>,
) -> Result<Json<OkBody<SourcesBody>>, AppError> {
    let sources = blocking(move || {
        let db = lock(&state.db, "database")?;
        Ok(db.list_sources()?)
    })
    .await?;
    Ok(ok(SourcesBody { sources }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ingest", get(ingest_handler))
        .route("/ingest/status", get(ingest_status_handler))
        .route("/triage/jobs", post(triage_handler))
        .route("/rank/shortlist", post(rank_handler))
        .route("/jobs", get(list_jobs_handler))
        .route("/jobs/manual", post(create_manual_job_handler))
        .route("/jobs/:id", get(get_job_handler))
        .route("/jobs/:id/save", post(save_job_handler))
        .route(
            "/applications",
            get(list_applications_handler).post(create_application_handler),
        )
        .route(
            "/applications/:id",
            get(get_application_handler).patch(update_application_handler),
        )
        .route("/applications/:id/archive", post(archive_application_handler))
        .route("/inbox", get(inbox_handler))
        .route("/sources", get(sources_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the API on localhost. The runtime is built here so the rest of the
/// binary stays synchronous.
pub fn run(db: Database, config: Config, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(db, config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the server runtime")?;
    runtime.block_on(async move {
        let app = router(state);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("Failed to bind port {port}"))?;
        tracing::info!(port, "pursuit API listening");
        axum::serve(listener, app).await.context("Server stopped")?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::models::Provider;

    fn test_config() -> Config {
        Config {
            ollama_base_url: None,
            ollama_model: None,
            openai_api_key: None,
            openai_model: None,
            rank_provider: Ok(Provider::Ollama),
            ingest_daily_cap: 2,
            openai_daily_cap: 10,
            web3_token: None,
            db_path: None,
            profile_path: None,
        }
    }

    fn test_app() -> Router {
        let db = Database::open_in_memory().unwrap();
        router(AppState::new(db, test_config()))
    }

    async fn request(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = request(test_app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], Value::Bool(true));
    }

    #[tokio::test]
    async fn missing_job_is_a_404_with_an_error_envelope() {
        let (status, body) = request(test_app(), "GET", "/jobs/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], Value::Bool(false));
        assert!(body["error"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn unknown_triage_filter_is_a_400() {
        let (status, body) = request(test_app(), "GET", "/jobs?triage=banana", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("banana"));
    }

    #[tokio::test]
    async fn rank_without_a_configured_provider_is_a_503() {
        let (status, body) = request(test_app(), "POST", "/rank/shortlist", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("OLLAMA_BASE_URL"));
    }

    #[tokio::test]
    async fn triage_with_no_candidates_reports_zero_counts() {
        let (status, body) = request(
            test_app(),
            "POST",
            "/triage/jobs",
            Some(json!({ "mode": "new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], json!(0));
        assert_eq!(body["openai_used"], json!(0));
        assert_eq!(body["openai_skipped_cap"], json!(0));
    }

    #[tokio::test]
    async fn ingest_status_reports_an_untouched_budget() {
        let (status, body) = request(test_app(), "GET", "/ingest/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["used"], json!(0));
        assert_eq!(body["limit"], json!(2));
        assert_eq!(body["remaining"], json!(2));
    }

    #[tokio::test]
    async fn manual_job_round_trip() {
        let app = test_app();

        let (status, body) = request(
            app.clone(),
            "POST",
            "/jobs/manual",
            Some(json!({ "role": "Frontend Engineer", "company": "Acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["job"]["id"].as_i64().unwrap();
        assert_eq!(body["job"]["source"], json!("Manual"));
        assert_eq!(body["triage"]["attempted"], json!(false));

        let (status, body) = request(app.clone(), "GET", "/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["items"][0]["company"], json!("Acme"));

        let (status, body) = request(app, "GET", &format!("/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job"]["role"], json!("Frontend Engineer"));
    }

    #[tokio::test]
    async fn manual_job_without_a_company_is_a_400() {
        let (status, _body) = request(
            test_app(),
            "POST",
            "/jobs/manual",
            Some(json!({ "role": "Frontend Engineer" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn application_lifecycle_over_http() {
        let app = test_app();

        let (_, body) = request(
            app.clone(),
            "POST",
            "/jobs/manual",
            Some(json!({ "role": "Frontend Engineer", "company": "Acme" })),
        )
        .await;
        let job_id = body["job"]["id"].as_i64().unwrap();

        let (status, body) =
            request(app.clone(), "POST", &format!("/jobs/{job_id}/save"), None).await;
        assert_eq!(status, StatusCode::OK);
        let app_id = body["application"]["id"].as_i64().unwrap();
        assert_eq!(body["application"]["status"], json!("saved"));
        assert!(body["application"]["next_action_at"].is_string());

        // The fresh follow-up shows up in the inbox (tomorrow -> upcoming).
        let (_, body) = request(app.clone(), "GET", "/inbox", None).await;
        assert_eq!(body["upcoming"].as_array().unwrap().len(), 1);

        let (status, body) = request(
            app.clone(),
            "PATCH",
            &format!("/applications/{app_id}"),
            Some(json!({ "status": "applied", "next_action_at": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["application"]["status"], json!("applied"));
        assert!(body["application"]["next_action_at"].is_null());

        let (status, body) = request(
            app.clone(),
            "POST",
            &format!("/applications/{app_id}/archive"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["application"]["status"], json!("archived"));

        // created_from_job, status_changed, next_action_cleared, archived.
        let (_, body) = request(
            app,
            "GET",
            &format!("/applications/{app_id}"),
            None,
        )
        .await;
        assert_eq!(body["log"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn patch_without_next_action_leaves_the_follow_up_alone() {
        let app = test_app();
        let (_, body) = request(
            app.clone(),
            "POST",
            "/applications",
            Some(json!({
                "company": "Acme",
                "role": "Frontend Engineer",
                "next_action_at": "2026-03-01"
            })),
        )
        .await;
        let app_id = body["application"]["id"].as_i64().unwrap();

        let (status, body) = request(
            app,
            "PATCH",
            &format!("/applications/{app_id}"),
            Some(json!({ "notes": "Pinged the recruiter." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["application"]["next_action_at"], json!("2026-03-01"));
        assert_eq!(body["application"]["notes"], json!("Pinged the recruiter."));
    }
}
