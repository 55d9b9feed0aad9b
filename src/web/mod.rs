//! Dashboard and service endpoints

use std::num::NonZeroU16;
use std::path::PathBuf;

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::display::{CameraState, PromptPair, PromptSensor};
use crate::error::CanvasError;
use crate::services::Canvas;

mod images;

#[derive(Clone)]
pub(crate) struct AppState {
    canvas: Canvas,
}

impl AppState {
    fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }

    fn image_path(&self) -> PathBuf {
        self.canvas.config().image_path.clone()
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub(crate) struct DashboardTemplate {
    location: String,
    has_prompt: bool,
    prompt_in: String,
    prompt_out: String,
    prompt_updated: String,
    has_image: bool,
    image_url: String,
    image_updated: String,
}

#[derive(Serialize, Debug)]
struct ImageResult {
    image_url: Option<String>,
}

async fn root_handler(State(state): State<AppState>) -> DashboardTemplate {
    let sensor = state.canvas.displays().prompt().await;
    let camera = state.canvas.displays().camera().await;
    let (prompt_in, prompt_out) = sensor
        .prompt
        .map(|pair| (pair.prompt_in, pair.prompt_out))
        .unwrap_or_default();
    DashboardTemplate {
        location: state.canvas.location().to_string(),
        has_prompt: !prompt_out.is_empty(),
        prompt_in,
        prompt_out,
        prompt_updated: sensor
            .updated_at
            .map(|at| at.to_rfc2822())
            .unwrap_or_default(),
        has_image: camera.image_url.is_some(),
        image_url: camera.image_url.unwrap_or_default(),
        image_updated: camera
            .updated_at
            .map(|at| at.to_rfc2822())
            .unwrap_or_default(),
    }
}

async fn prompt_state_handler(State(state): State<AppState>) -> Json<PromptSensor> {
    Json(state.canvas.displays().prompt().await)
}

async fn camera_state_handler(State(state): State<AppState>) -> Json<CameraState> {
    Json(state.canvas.displays().camera().await)
}

async fn create_prompt_handler(State(state): State<AppState>) -> Json<PromptPair> {
    Json(state.canvas.create_prompt().await)
}

async fn create_image_handler(State(state): State<AppState>) -> Response {
    let image_url = state.canvas.create_image().await;
    let status = if image_url.is_some() {
        StatusCode::OK
    } else {
        error!("Failed to generate image or invalid URL received");
        StatusCode::BAD_GATEWAY
    };
    (status, Json(ImageResult { image_url })).into_response()
}

async fn load_test_image_handler(State(state): State<AppState>) -> StatusCode {
    state.canvas.load_test_image();
    StatusCode::ACCEPTED
}

async fn camera_image_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, CanvasError> {
    images::camera_image_response(&state.image_path(), &headers).await
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

fn create_router(state: &AppState) -> Router<AppState> {
    let local_dir = state
        .image_path()
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Router::new()
        .route("/", axum::routing::get(root_handler))
        .route("/static/styles.css", axum::routing::get(styles_handler))
        .route("/api/prompt", axum::routing::get(prompt_state_handler))
        .route("/api/camera", axum::routing::get(camera_state_handler))
        .route("/camera/latest", axum::routing::get(camera_image_handler))
        .route(
            "/services/create_prompt",
            axum::routing::post(create_prompt_handler),
        )
        .route(
            "/services/create_image",
            axum::routing::post(create_image_handler),
        )
        .route(
            "/services/load_test_image",
            axum::routing::post(load_test_image_handler),
        )
        .nest_service("/local", ServeDir::new(local_dir))
}

/// Builds the app for `canvas`
pub fn app(canvas: Canvas) -> Router {
    let state = AppState::new(canvas);
    create_router(&state).with_state(state)
}

/// Serves the dashboard and service endpoints until the listener fails.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    canvas: Canvas,
) -> Result<(), anyhow::Error> {
    let app = app(canvas);

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}
