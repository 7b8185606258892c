//! HTTP request handlers.

use super::types::{
    ApiError, DownloadInfo, HealthResponse, RegisterForm, RegisterResponse,
};
use super::WebState;
use artifact_gen::RedeemedArtifact;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use identity_store::ArtifactKind;
use registration_core::WebRegisterRequest;
use std::net::SocketAddr;
use tokio_util::io::ReaderStream;
use tracing::info;

/// Health check endpoint.
pub async fn health(State(state): State<WebState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        bundles_enabled: state.artifacts.bundles_enabled(),
    })
}

/// Serve the registration form.
pub async fn register_page(State(state): State<WebState>) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{name} — registration</title></head>
<body>
<h1>{name}</h1>
<form method="post" action="/register">
  <label>Username: <input name="username" required></label><br>
  <label>Password: <input name="password" type="password" required></label><br>
  <label>Nickname (optional): <input name="nickname"></label><br>
  <button type="submit">Register</button>
</form>
</body>
</html>"#,
        name = state.server_name
    ))
}

/// Handle a registration form submission.
pub async fn register(
    State(state): State<WebState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let ip_address = client_ip(&headers, connect_info.as_ref());
    info!(ip = %ip_address, username = %form.username, "Web registration request");

    let outcome = state
        .service
        .register(WebRegisterRequest {
            username: form.username,
            password: form.password,
            nickname: form.nickname,
            ip_address,
            locale: state.locale.clone(),
        })
        .await?;

    let config_download = DownloadInfo {
        url: format!("/download/config/{}", outcome.config.token),
        token: outcome.config.token.clone(),
        filename: outcome.config.user_facing_filename.clone(),
    };
    let bundle_download = outcome.bundle.as_ref().map(|bundle| DownloadInfo {
        url: format!("/download/bundle/{}", bundle.token),
        token: bundle.token.clone(),
        filename: bundle.user_facing_filename.clone(),
    });

    Ok(Json(RegisterResponse {
        username: outcome.username,
        quick_connect: outcome.quick_connect,
        config_download,
        bundle_download,
    }))
}

/// Redeem a connection-file token and stream the download.
pub async fn download_config(
    State(state): State<WebState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    serve_artifact(&state, &token, ArtifactKind::ConfigFile, "application/octet-stream").await
}

/// Redeem a client-bundle token and stream the download.
pub async fn download_bundle(
    State(state): State<WebState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    serve_artifact(&state, &token, ArtifactKind::ClientBundle, "application/zip").await
}

async fn serve_artifact(
    state: &WebState,
    token: &str,
    kind: ArtifactKind,
    content_type: &'static str,
) -> Result<Response, ApiError> {
    let redeemed = state
        .artifacts
        .redeem(token, kind)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match redeemed {
        Some(artifact) => Ok(stream_artifact(artifact, content_type)),
        // Unknown, expired and already-used tokens are indistinguishable
        // on purpose.
        None => Err(ApiError::not_found("File not found, expired, or already used")),
    }
}

fn stream_artifact(artifact: RedeemedArtifact, content_type: &'static str) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.filename.replace('"', "_")
    );
    let stream = ReaderStream::new(artifact.file);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Best client address guess: proxy header first, then the socket peer.
fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
