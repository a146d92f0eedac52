use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sonda_common::config::ReconConfig;
use sonda_common::error::ReconError;
use sonda_common::network::ports::PortSpec;
use sonda_common::network::target::Target;
use sonda_core::pipeline::ReconPipeline;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::notify::WebhookNotifier;

/// Older deployments configure the webhook under this name.
pub const LEGACY_WEBHOOK_VAR: &str = "N8N_ENDPOINT";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ReconPipeline>,
    notifier: WebhookNotifier,
}

impl AppState {
    pub fn new(pipeline: ReconPipeline, notifier: WebhookNotifier) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            notifier,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconRequest {
    pub target: String,
    #[serde(default)]
    pub ports: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/recon", post(recon)).with_state(state)
}

/// The configured URL wins; a blank one counts as unset.
fn webhook_url(configured: Option<String>, legacy: Option<String>) -> Option<String> {
    configured
        .filter(|url| !url.trim().is_empty())
        .or_else(|| legacy.filter(|url| !url.trim().is_empty()))
}

pub async fn serve(port: u16, webhook_url_arg: Option<String>, config: ReconConfig) -> anyhow::Result<()> {
    let legacy = std::env::var(LEGACY_WEBHOOK_VAR).ok();
    let notifier = WebhookNotifier::new(webhook_url(webhook_url_arg, legacy));
    if !notifier.is_enabled() {
        info!("No webhook configured, reports are only returned to the caller");
    }
    let state = AppState::new(ReconPipeline::new(config), notifier);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening for reconnaissance requests on {addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn recon(State(state): State<AppState>, payload: Result<Json<ReconRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let (target, ports) = match parse_request(&request) {
        Ok(parsed) => parsed,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    info!("Reconnaissance requested for {target}");
    match state.pipeline.run(&target, ports.as_ref()).await {
        Ok(result) => {
            let report = result.to_report();
            state.notifier.notify(report.clone());
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) if e.is_client_error() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Reconnaissance of {target} failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn parse_request(request: &ReconRequest) -> Result<(Target, Option<PortSpec>), ReconError> {
    let target: Target = request.target.parse()?;
    let ports: Option<PortSpec> = request
        .ports
        .as_deref()
        .map(str::trim)
        .filter(|ports| !ports.is_empty())
        .map(str::parse)
        .transpose()?;
    Ok((target, ports))
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
