//! The HTTP remote. Starts and stops apps through the same supervisor the
//! touch loop uses.

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use chrono::{DateTime, Local};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use kiosk::App;
use kiosk::supervisor::SharedSupervisor;

#[derive(Clone)]
pub struct ServerState {
    pub supervisor: SharedSupervisor,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

impl ActionResponse {
    fn success(message: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: "success".to_string(),
                message,
            }),
        )
    }

    fn error(code: StatusCode, message: String) -> (StatusCode, Json<Self>) {
        (
            code,
            Json(Self {
                status: "error".to_string(),
                message,
            }),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub active_scripts: Vec<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Local>>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/start/{app}", get(start_app))
        .route("/stop/{app}", get(stop_app))
        .route("/status", get(get_status))
        .with_state(state)
}

pub fn run_server(
    task_tracker: &TaskTracker,
    listener: TcpListener,
    state: ServerState,
    shutdown_token: CancellationToken,
) {
    let app = router(state);
    task_tracker.spawn(async move {
        if let Ok(addr) = listener.local_addr() {
            info!("remote listening on {addr}");
        }
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
            .await;
        if let Err(e) = result {
            error!("remote server failed: {e}");
        }
    });
}

pub async fn start_app(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResponse>) {
    let app = match name.parse::<App>() {
        Ok(app) => app,
        Err(e) => return ActionResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let mut supervisor = state.supervisor.lock().await;
    supervisor.refresh().await;
    if supervisor.active_app() == Some(app) {
        return ActionResponse::error(StatusCode::CONFLICT, format!("{app} is already running"));
    }
    info!("remote: starting {app}");
    match supervisor.launch(app).await {
        Ok(()) => ActionResponse::success(format!("{app} started")),
        Err(e) => {
            error!("remote: failed to start {app}: {e}");
            ActionResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn stop_app(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResponse>) {
    let app = match name.parse::<App>() {
        Ok(app) => app,
        Err(e) => return ActionResponse::error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let mut supervisor = state.supervisor.lock().await;
    supervisor.refresh().await;
    if supervisor.active_app() != Some(app) {
        return ActionResponse::error(StatusCode::NOT_FOUND, format!("{app} is not running"));
    }
    info!("remote: stopping {app}");
    supervisor.terminate_current().await;
    ActionResponse::success(format!("{app} stopped"))
}

pub async fn get_status(State(state): State<ServerState>) -> Json<StatusResponse> {
    let mut supervisor = state.supervisor.lock().await;
    let active_scripts = supervisor.status().await;
    Json(StatusResponse {
        active_scripts,
        started_at: supervisor.active().map(|a| a.started_at),
    })
}
