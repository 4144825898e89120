use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use redline_config::Config;
use redline_contracts::{
    contracts_manifest_v1, ContractsMetadata, FeedbackRequest, FeedbackResponse, HealthResponse,
    ProcessTextRequest, ProcessTextResponse, PARAM_CUSTOM_PROMPT,
};
use redline_kernel::{resolve, validate_feedback, ServiceError};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod error;
pub mod extract;
pub mod gateway;
pub mod logger;
pub mod sink;

use error::ApiError;
use extract::AppJson;
use gateway::{BedrockHttpProvider, GenerationGateway, GenerationProvider};
use logger::StructuredLogger;

const FEEDBACK_THANKS: &str = "Thank you for your feedback! We appreciate your input.";

pub async fn serve<F>(cfg: Config, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = cfg
        .server
        .listen_addr
        .parse()
        .map_err(|e| ServiceError::configuration(format!("invalid listen_addr: {e}")))?;

    let app = build_app(cfg)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::configuration(format!("bind failed: {e}")))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServiceError::processing(format!("serve failed: {e}")))
}

/// Router wired to the configured provider and log sink.
pub fn build_app(cfg: Config) -> Result<Router, ServiceError> {
    let provider = Arc::new(BedrockHttpProvider::new(&cfg.generation)?);
    let logger = StructuredLogger::from_config(&cfg)?;
    Ok(build_app_with(&cfg, provider, logger))
}

/// Router with an injected provider and logger.
pub fn build_app_with(
    cfg: &Config,
    provider: Arc<dyn GenerationProvider>,
    logger: StructuredLogger,
) -> Router {
    let state = AppState {
        gateway: Arc::new(GenerationGateway::new(provider)),
        logger: Arc::new(logger),
    };
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v1/contracts", get(contracts))
        .route("/api/v1/process-text", post(process_text))
        .route("/api/v1/feedback", post(feedback))
        .with_state(state)
        .layer(cors_layer(&cfg.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

#[derive(Clone)]
struct AppState {
    gateway: Arc<GenerationGateway>,
    logger: Arc<StructuredLogger>,
}

async fn root() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("Redline writing service is running"))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("Service is healthy"))
}

async fn contracts() -> Json<ContractsMetadata> {
    Json(ContractsMetadata::from_manifest(&contracts_manifest_v1()))
}

async fn process_text(
    State(state): State<AppState>,
    AppJson(req): AppJson<ProcessTextRequest>,
) -> Json<ProcessTextResponse> {
    let started = Instant::now();
    let session_id = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_session_id);
    let parameters = req.parameters.clone().unwrap_or_default();

    state
        .logger
        .request_start(
            &session_id,
            &req.action,
            req.selected_text.chars().count(),
            req.parameter(PARAM_CUSTOM_PROMPT).filter(|t| !t.is_empty()),
        )
        .await;

    let instruction = match resolve(&req.selected_text, &req.action, &parameters) {
        Ok(instruction) => instruction,
        Err(err) => {
            state.logger.validation_error(Some(&session_id), &err).await;
            return Json(text_failure(req.selected_text, session_id, &err));
        }
    };

    match state.gateway.invoke(&instruction).await {
        Ok(processed_text) => {
            state
                .logger
                .request_success(
                    &session_id,
                    &req.action,
                    started.elapsed(),
                    processed_text.chars().count(),
                )
                .await;
            Json(ProcessTextResponse {
                success: true,
                processed_text,
                message: instruction.summary(),
                session_id,
            })
        }
        Err(err) => {
            state
                .logger
                .request_error(&session_id, &req.action, &err)
                .await;
            Json(text_failure(req.selected_text, session_id, &err))
        }
    }
}

async fn feedback(
    State(state): State<AppState>,
    AppJson(req): AppJson<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    let valid = match validate_feedback(&req) {
        Ok(valid) => valid,
        Err(err) => {
            state
                .logger
                .validation_error(req.session_id.as_deref(), &err)
                .await;
            return Json(FeedbackResponse {
                success: false,
                message: err.user_message(),
                feedback_id: String::new(),
            });
        }
    };

    let feedback_id = Uuid::new_v4().to_string();
    state.logger.feedback_submitted(&feedback_id, &valid).await;
    if valid.is_critical() {
        state.logger.critical_feedback(&feedback_id, &valid).await;
    }
    Json(FeedbackResponse {
        success: true,
        message: FEEDBACK_THANKS.to_string(),
        feedback_id,
    })
}

// The caller always gets text back: on failure the input is echoed.
fn text_failure(
    selected_text: String,
    session_id: String,
    err: &ServiceError,
) -> ProcessTextResponse {
    ProcessTextResponse {
        success: false,
        processed_text: selected_text,
        message: err.user_message(),
        session_id,
    }
}

fn new_session_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("session_{}", &hex[..8])
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AnyOrigin);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid cors origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    ApiError::internal().into_response()
}
