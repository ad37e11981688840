use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::client::ServiceClient;
use crate::config::Config;
use crate::error::ArtistryError;
use crate::health::{check_services, ServiceHealth};
use crate::models::{
    AuthMode, AuthSession, BudgetTier, Credentials, GenerateOptions, RoomJob, RoomJobStatus,
    ShareLink, TokenStatus, UploadedImage, UserPreferences,
};
use crate::poll::CancelHandle;
use crate::results::DiyInstructions;
use crate::workflow::{
    wait_for_room_job, FlowKind, Orchestrator, StateProjection, WorkflowRun, WorkflowSnapshot,
};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// A run and the orchestrator driving it. `run` is empty while stage work
/// holds it; `seq` orders runs by when they were started.
struct RunEntry {
    orchestrator: Orchestrator,
    run: Option<WorkflowRun>,
    seq: u64,
}

#[derive(Clone)]
pub struct AppState {
    runs: Arc<RwLock<HashMap<Uuid, RunEntry>>>,
    next_seq: Arc<AtomicU64>,
    pub client: Arc<dyn ServiceClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(client: Arc<dyn ServiceClient>, config: Config) -> Self {
        Self { runs: Arc::default(), next_seq: Arc::default(), client, config: Arc::new(config) }
    }

    /// Register a new run, already checked out to the caller.
    fn start(&self, flow: FlowKind, image: UploadedImage, preferences: UserPreferences) -> (Uuid, Orchestrator, WorkflowRun) {
        let orchestrator = Orchestrator::new(self.client.clone(), StateProjection::new())
            .with_save(self.config.save_results);
        let run = orchestrator.new_run(flow, image, preferences);
        let id = run.id();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.runs.write().insert(id, RunEntry { orchestrator: orchestrator.clone(), run: None, seq });
        (id, orchestrator, run)
    }

    fn checkout(&self, id: Uuid) -> Result<(Orchestrator, WorkflowRun), ApiError> {
        let mut runs = self.runs.write();
        let entry = runs.get_mut(&id).ok_or(ApiError::UnknownRun(id))?;
        let run = entry.run.take().ok_or(ApiError::Busy(id))?;
        Ok((entry.orchestrator.clone(), run))
    }

    /// Hand a run back. A run deleted while it was out stays deleted.
    fn checkin(&self, run: WorkflowRun) {
        let mut runs = self.runs.write();
        let finished = run.phase().is_terminal();
        if let Some(entry) = runs.get_mut(&run.id()) {
            entry.run = Some(run);
        }
        if finished {
            evict_finished(&mut runs, self.config.max_finished_runs);
        }
    }

    /// Drive stage work on its own task. The run goes back into the registry
    /// when the work ends, even if the request that started it has gone away.
    async fn detached<T, F>(&self, work: F) -> Result<(WorkflowSnapshot, T), ApiError>
    where
        T: Send + 'static,
        F: Future<Output = (WorkflowRun, crate::error::Result<T>)> + Send + 'static,
    {
        let state = self.clone();
        let task = tokio::spawn(async move {
            let (run, outcome) = work.await;
            let snapshot = run.snapshot();
            state.checkin(run);
            outcome.map(|value| (snapshot, value))
        });
        let outcome = task.await.map_err(|e| ApiError::Aborted(e.to_string()))?;
        Ok(outcome?)
    }

    fn orchestrator(&self, id: Uuid) -> Result<Orchestrator, ApiError> {
        self.runs.read().get(&id).map(|e| e.orchestrator.clone()).ok_or(ApiError::UnknownRun(id))
    }
}

/// Drop the oldest finished runs beyond `keep`. Runs in flight or waiting on
/// the user are never touched.
fn evict_finished(runs: &mut HashMap<Uuid, RunEntry>, keep: usize) {
    let mut finished: Vec<(u64, Uuid)> = runs
        .iter()
        .filter(|(_, entry)| entry.run.as_ref().is_some_and(|run| run.phase().is_terminal()))
        .map(|(id, entry)| (entry.seq, *id))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort_unstable();
    for (_, id) in &finished[..finished.len() - keep] {
        runs.remove(id);
        tracing::debug!("🧹 Evicted finished run {}", id);
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown run {0}")]
    UnknownRun(Uuid),
    #[error("run {0} is busy")]
    Busy(Uuid),
    #[error("stage work aborted: {0}")]
    Aborted(String),
    #[error(transparent)]
    Artistry(#[from] ArtistryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, stage) = match &self {
            ApiError::UnknownRun(_) => (StatusCode::NOT_FOUND, None),
            ApiError::Busy(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Aborted(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::Artistry(err) if err.is_validation() => (StatusCode::BAD_REQUEST, None),
            ApiError::Artistry(err) => (StatusCode::BAD_GATEWAY, err.stage()),
        };
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        }
        (status, Json(json!({ "error": self.to_string(), "stage": stage }))).into_response()
    }
}

/// Fields of a multipart upload: `file` plus optional text fields.
#[derive(Default)]
struct Upload {
    image: Option<UploadedImage>,
    prompt: Option<String>,
    budget: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| ArtistryError::validation(format!("bad upload: {e}"));
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad)?;
                upload.image = Some(UploadedImage::new(file_name, bytes.to_vec())?);
            }
            "prompt" => upload.prompt = Some(field.text().await.map_err(bad)?),
            "budget" => upload.budget = Some(field.text().await.map_err(bad)?),
            other => tracing::debug!("ignoring upload field {}", other),
        }
    }
    Ok(upload)
}

impl Upload {
    fn image(&mut self) -> Result<UploadedImage, ApiError> {
        self.image
            .take()
            .ok_or_else(|| ArtistryError::validation("Please select an image to upload").into())
    }

    fn preferences(&self) -> Result<UserPreferences, ApiError> {
        let budget = match self.budget.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => b.parse::<BudgetTier>()?,
            None => BudgetTier::default(),
        };
        Ok(UserPreferences {
            budget,
            ..UserPreferences::with_prompt(self.prompt.clone().unwrap_or_default())
        })
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn services_health(State(state): State<AppState>) -> Json<Vec<ServiceHealth>> {
    Json(check_services(&state.config).await)
}

pub async fn start_linear(State(state): State<AppState>, multipart: Multipart) -> Result<Json<WorkflowSnapshot>, ApiError> {
    let mut upload = read_upload(multipart).await?;
    let (image, preferences) = (upload.image()?, upload.preferences()?);
    let (_, orchestrator, mut run) = state.start(FlowKind::Linear, image, preferences);
    let (snapshot, ()) = state
        .detached(async move {
            let outcome = orchestrator.run_linear(&mut run).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(snapshot))
}

pub async fn start_interactive(State(state): State<AppState>, multipart: Multipart) -> Result<Json<WorkflowSnapshot>, ApiError> {
    let mut upload = read_upload(multipart).await?;
    let image = upload.image()?;
    let (_, orchestrator, mut run) = state.start(FlowKind::Interactive, image, UserPreferences::default());
    let (snapshot, ()) = state
        .detached(async move {
            let outcome = orchestrator.begin_interactive(&mut run).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(snapshot))
}

pub async fn start_budget(State(state): State<AppState>, multipart: Multipart) -> Result<Json<WorkflowSnapshot>, ApiError> {
    let mut upload = read_upload(multipart).await?;
    let image = upload.image()?;
    let (_, orchestrator, mut run) = state.start(FlowKind::BudgetAware, image, UserPreferences::default());
    let (snapshot, ()) = state
        .detached(async move {
            let outcome = orchestrator.begin_budget(&mut run).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(snapshot))
}

pub async fn get_workflow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WorkflowSnapshot>, ApiError> {
    Ok(Json(state.orchestrator(id)?.projection().current()))
}

pub async fn abandon_workflow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let entry = state.runs.write().remove(&id).ok_or(ApiError::UnknownRun(id))?;
    entry.orchestrator.projection().clear();
    tracing::info!("🗑️ Abandoned run {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub feedback: String,
}

pub async fn submit_feedback(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<WorkflowSnapshot>, ApiError> {
    let (orchestrator, mut run) = state.checkout(id)?;
    let (snapshot, ()) = state
        .detached(async move {
            let outcome = orchestrator.submit_feedback(&mut run, &body.feedback).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(snapshot))
}

pub async fn finish_interactive(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WorkflowSnapshot>, ApiError> {
    let (orchestrator, mut run) = state.checkout(id)?;
    let (snapshot, ()) = state
        .detached(async move {
            let outcome = orchestrator.finish_interactive(&mut run).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(snapshot))
}

pub async fn submit_preferences(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(preferences): Json<UserPreferences>,
) -> Result<Json<WorkflowSnapshot>, ApiError> {
    let (orchestrator, mut run) = state.checkout(id)?;
    let (snapshot, ()) = state
        .detached(async move {
            let outcome = orchestrator.run_budget(&mut run, preferences).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct DiyRequest {
    pub item: String,
}

pub async fn diy(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<DiyRequest>,
) -> Result<Json<DiyInstructions>, ApiError> {
    let (orchestrator, mut run) = state.checkout(id)?;
    let (_, value) = state
        .detached(async move {
            let outcome = orchestrator.diy_instructions(&mut run, &body.item).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub platform: String,
}

pub async fn share(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ShareRequest>,
) -> Result<Json<ShareLink>, ApiError> {
    let (orchestrator, mut run) = state.checkout(id)?;
    let (_, value) = state
        .detached(async move {
            let outcome = orchestrator.share(&mut run, &body.platform).await;
            (run, outcome)
        })
        .await?;
    Ok(Json(value))
}

async fn authenticate(state: &AppState, mode: AuthMode, mut credentials: Credentials) -> Result<Json<AuthSession>, ApiError> {
    credentials.mode = mode;
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(ArtistryError::validation("email and password are required").into());
    }
    Ok(Json(state.client.authenticate(&credentials).await?))
}

pub async fn login(State(state): State<AppState>, Json(credentials): Json<Credentials>) -> Result<Json<AuthSession>, ApiError> {
    authenticate(&state, AuthMode::Login, credentials).await
}

pub async fn signup(State(state): State<AppState>, Json(credentials): Json<Credentials>) -> Result<Json<AuthSession>, ApiError> {
    authenticate(&state, AuthMode::Signup, credentials).await
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

pub async fn verify(State(state): State<AppState>, Json(body): Json<VerifyRequest>) -> Result<Json<TokenStatus>, ApiError> {
    Ok(Json(state.client.verify_token(&body.token).await?))
}

pub async fn submit_room(State(state): State<AppState>, multipart: Multipart) -> Result<Json<RoomJob>, ApiError> {
    let mut upload = read_upload(multipart).await?;
    let image = upload.image()?;
    let preferences = upload.preferences()?;
    let prompt = preferences.style_prompt().unwrap_or(crate::workflow::DEFAULT_DESIGN_PROMPT);
    let options = GenerateOptions::for_budget(preferences.budget);
    Ok(Json(state.client.submit_room_job(&image, prompt, &options).await?))
}

pub async fn room_status(Path(job_id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<RoomJobStatus>, ApiError> {
    Ok(Json(state.client.room_job_status(&job_id.to_string()).await?))
}

/// Block until the job finishes. Dropping the request drops the wait.
pub async fn wait_room(Path(job_id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<RoomJobStatus>, ApiError> {
    let job_id = job_id.to_string();
    let status = wait_for_room_job(state.client.as_ref(), &job_id, &state.config.poll, &CancelHandle::new()).await?;
    Ok(Json(status))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/services/health", get(services_health))
        .route("/api/workflows/linear", post(start_linear))
        .route("/api/workflows/interactive", post(start_interactive))
        .route("/api/workflows/budget", post(start_budget))
        .route("/api/workflows/:id", get(get_workflow).delete(abandon_workflow))
        .route("/api/workflows/:id/feedback", post(submit_feedback))
        .route("/api/workflows/:id/generate", post(finish_interactive))
        .route("/api/workflows/:id/preferences", post(submit_preferences))
        .route("/api/workflows/:id/diy", post(diy))
        .route("/api/workflows/:id/share", post(share))
        .route("/api/auth/login", post(login))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/verify", post(verify))
        .route("/api/rooms", post(submit_room))
        .route("/api/rooms/:job_id", get(room_status))
        .route("/api/rooms/:job_id/wait", post(wait_room))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;
    use crate::workflow::testing::StubClient;
    use crate::workflow::Phase;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "artistry-test-boundary";

    fn app(stub: StubClient) -> (AppState, Router) {
        let config = Config { save_results: false, ..Config::default() };
        let state = AppState::new(Arc::new(stub), config);
        (state.clone(), router(state))
    }

    fn multipart(path: &str, fields: &[(&str, &str)]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"room.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        body.extend_from_slice(b"\r\n");
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::post(path)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(path: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn linear_upload_runs_to_completion() {
        let (_, app) = app(StubClient::default());

        let response = app
            .oneshot(multipart("/api/workflows/linear", &[("prompt", "cosy cabin"), ("budget", "high")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["phase"], "complete");
        assert_eq!(body["progressPercent"], 100);
        assert_eq!(body["results"].as_array().unwrap().len(), 4);
        assert_eq!(body["results"][0]["kind"], "detection");
    }

    #[tokio::test]
    async fn unknown_budget_is_a_bad_request() {
        let (_, app) = app(StubClient::default());
        let response = app.oneshot(multipart("/api/workflows/linear", &[("budget", "lavish")])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stage_failures_are_bad_gateway_with_stage() {
        let (_, app) = app(StubClient::failing(Stage::Segment));

        let response = app.oneshot(multipart("/api/workflows/linear", &[])).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = read_json(response).await;
        assert_eq!(body["stage"], "segment");
        assert_eq!(body["error"], "segment failed: segment service unavailable");
    }

    #[tokio::test]
    async fn interactive_round_trip_over_http() {
        let (state, app) = app(StubClient::default());

        let response = app.clone().oneshot(multipart("/api/workflows/interactive", &[])).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["phase"], "awaitingUserFeedback");
        let id = body["runId"].as_str().unwrap().to_string();

        let blank = app
            .clone()
            .oneshot(json_request(&format!("/api/workflows/{id}/feedback"), json!({ "feedback": "" })))
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(&format!("/api/workflows/{id}/feedback"), json!({ "feedback": "warmer" })))
            .await
            .unwrap();
        assert_eq!(read_json(response).await["phase"], "readyToGenerate");

        let response = app
            .clone()
            .oneshot(Request::post(format!("/api/workflows/{id}/generate")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(read_json(response).await["phase"], "complete");

        let uuid: Uuid = id.parse().unwrap();
        assert_eq!(state.orchestrator(uuid).unwrap().projection().current().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn budget_preferences_and_unknown_runs() {
        let (_, app) = app(StubClient::default());

        let response = app.clone().oneshot(multipart("/api/workflows/budget", &[])).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["phase"], "collectingPreferences");
        let id = body["runId"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                &format!("/api/workflows/{id}/preferences"),
                json!({ "budget": "low", "selectedItems": ["bed"], "roomSizeSqft": 100 }),
            ))
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["phase"], "complete");

        let missing = app
            .oneshot(Request::get(format!("/api/workflows/{}", Uuid::new_v4())).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn abandoned_runs_are_gone() {
        let (state, app) = app(StubClient::default());
        let response = app.clone().oneshot(multipart("/api/workflows/budget", &[])).await.unwrap();
        let id: Uuid = read_json(response).await["runId"].as_str().unwrap().parse().unwrap();

        let response = app
            .clone()
            .oneshot(Request::delete(format!("/api/workflows/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(matches!(state.checkout(id), Err(ApiError::UnknownRun(_))));
    }

    #[tokio::test]
    async fn dropped_requests_do_not_strand_the_run() {
        let stub = StubClient::default();
        stub.slow(Stage::Refine, Duration::from_millis(300));
        let (state, app) = app(stub);
        let response = app.clone().oneshot(multipart("/api/workflows/interactive", &[])).await.unwrap();
        let id: Uuid = read_json(response).await["runId"].as_str().unwrap().parse().unwrap();

        let feedback = json_request(&format!("/api/workflows/{id}/feedback"), json!({ "feedback": "warmer" }));
        let gave_up = tokio::time::timeout(Duration::from_millis(50), app.clone().oneshot(feedback)).await;
        assert!(gave_up.is_err());
        assert!(matches!(state.checkout(id), Err(ApiError::Busy(_))));

        tokio::time::sleep(Duration::from_millis(600)).await;
        let projection = state.orchestrator(id).unwrap().projection().current();
        assert_eq!(projection.phase, Phase::ReadyToGenerate);

        let response = app
            .oneshot(Request::post(format!("/api/workflows/{id}/generate")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["phase"], "complete");
    }

    #[tokio::test]
    async fn only_the_newest_finished_runs_are_kept() {
        let config = Config { save_results: false, max_finished_runs: 3, ..Config::default() };
        let state = AppState::new(Arc::new(StubClient::default()), config);

        let (waiting, orchestrator, mut run) =
            state.start(FlowKind::Interactive, crate::workflow::testing::png(), UserPreferences::default());
        orchestrator.begin_interactive(&mut run).await.unwrap();
        state.checkin(run);

        let mut finished = Vec::new();
        for _ in 0..5 {
            let (id, orchestrator, mut run) =
                state.start(FlowKind::Linear, crate::workflow::testing::png(), UserPreferences::default());
            orchestrator.run_linear(&mut run).await.unwrap();
            state.checkin(run);
            finished.push(id);
        }

        assert_eq!(state.runs.read().len(), 4);
        for id in &finished[..2] {
            assert!(matches!(state.checkout(*id), Err(ApiError::UnknownRun(_))));
        }
        for id in &finished[2..] {
            assert!(state.orchestrator(*id).is_ok());
        }
        assert!(state.checkout(waiting).is_ok());
    }

    #[tokio::test]
    async fn room_job_ids_must_be_uuids() {
        let (_, app) = app(StubClient::default());

        let response = app
            .clone()
            .oneshot(Request::get("/api/rooms/..%2Fauth%2Fverify").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(Request::get(format!("/api/rooms/{}", Uuid::new_v4())).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn a_run_out_for_work_is_busy() {
        let state = AppState::new(Arc::new(StubClient::default()), Config::default());
        let image = crate::workflow::testing::png();
        let (id, _, run) = state.start(FlowKind::Linear, image, UserPreferences::default());

        assert!(matches!(state.checkout(id), Err(ApiError::Busy(_))));
        state.checkin(run);
        assert!(state.checkout(id).is_ok());
    }
}
