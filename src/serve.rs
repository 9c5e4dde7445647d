//! Purpose: Provide the loopback HTTP server that decodes request params into JSON trees.
//! Exports: `ServeConfig`, `serve`, `router`, `validate_config`.
//! Role: Axum-based front end for the decode core; mirrors how an API server ingests params.
//! Invariants: GET decodes the raw query; multipart decodes fields; anything else the body.
//! Invariants: Client-input failures map to 4xx; collaborator failures map to 5xx.
//! Invariants: Loopback-only unless explicitly allowed.

use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use formnest::api::{
    Error, ErrorKind, FieldKind, MultipartField, ParamOrigin, ParamSource, classify,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

#[derive(Clone, Debug)]
struct AppState {
    max_body_bytes: usize,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    let max_body_bytes = validate_config(&config)?;

    init_tracing();

    let app = router(max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(bind = %addr, max_body_bytes, "formnest server listening");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn router(max_body_bytes: usize) -> Router {
    let state = Arc::new(AppState { max_body_bytes });
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v0/decode", any(decode_params))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

/// Check the config and return the body limit as a platform size.
pub fn validate_config(config: &ServeConfig) -> Result<usize, Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    config.max_body_bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory.")
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

async fn decode_params(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let origin = classify(request.method().as_str(), content_type.as_deref());

    let result = match origin {
        ParamOrigin::Query => {
            let query = request.uri().query().unwrap_or_default().to_string();
            ParamSource::Query(&query).decode()
        }
        ParamOrigin::Multipart => match read_multipart(request).await {
            Ok(fields) => ParamSource::Multipart(fields).decode(),
            Err(response) => return response,
        },
        ParamOrigin::Body => match Bytes::from_request(request, &()).await {
            Ok(body) => ParamSource::Body(&body).decode(),
            Err(rejection) => {
                let status = rejection.status();
                return error_response_with_status(
                    body_error(status, state.max_body_bytes, rejection.body_text()),
                    status,
                );
            }
        },
    };

    match result {
        Ok(params) => json_response(json!({ "params": params })),
        Err(err) => {
            tracing::debug!(kind = ?err.kind(), key = err.key().unwrap_or_default(), "rejected params");
            error_response(err)
        }
    }
}

async fn read_multipart(request: Request) -> Result<Vec<MultipartField>, Response> {
    let mut multipart = Multipart::from_request(request, &()).await.map_err(|rejection| {
        error_response_with_status(
            Error::new(ErrorKind::Usage)
                .with_message("invalid multipart request")
                .with_hint(rejection.body_text()),
            rejection.status(),
        )
    })?;

    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let kind = if field.file_name().is_some() {
            FieldKind::File
        } else {
            FieldKind::Text
        };
        let data = field.bytes().await.map_err(multipart_error)?;
        fields.push(MultipartField { name, kind, data });
    }
    Ok(fields)
}

fn multipart_error(err: MultipartError) -> Response {
    let status = err.status();
    let error = if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::new(ErrorKind::Usage)
            .with_message("multipart body exceeds the size limit")
            .with_hint(err.body_text())
    } else {
        Error::new(ErrorKind::Io)
            .with_message("failed to read multipart field")
            .with_hint(err.body_text())
    };
    error_response_with_status(error, status)
}

fn body_error(status: StatusCode, limit: usize, detail: String) -> Error {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::new(ErrorKind::Usage)
            .with_message(format!("request body exceeds {limit} bytes"))
            .with_hint("Send a smaller body or raise --max-body-bytes.")
    } else {
        Error::new(ErrorKind::Io)
            .with_message("failed to read request body")
            .with_hint(detail)
    }
}

fn json_response(payload: serde_json::Value) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("formnest-version", HeaderValue::from_static("0"));
    response
}

fn error_response(err: Error) -> Response {
    let status = if err.kind().is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response_with_status(err, status)
}

fn error_response_with_status(err: Error, status: StatusCode) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            key: err.key().map(str::to_string),
            hint: err.hint().map(str::to_string),
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("formnest-version", HeaderValue::from_static("0"));
    response
}
