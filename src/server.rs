/*!
 * Web front end.
 *
 * Upload a lecture video, get redirected to a polling page, download the
 * rendered animation once the run completes. The run id doubles as the
 * per-client session, kept in a cookie.
 */

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use log::{error, info, warn};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use uuid::Uuid;

use crate::file_utils::{FileManager, VideoFormat};
use crate::jobs::{RunRegistry, RunState};
use crate::pipeline::{Pipeline, RunStage};

pub const SESSION_COOKIE: &str = "mathcast_upload";

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    registry: Arc<RunRegistry>,
    upload_dir: PathBuf,
    processed_dir: PathBuf,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        let server = &pipeline.config().server;
        Self {
            registry: Arc::new(
                RunRegistry::new(server.max_concurrent_runs)
                    .with_retention(Duration::from_secs(server.run_retention_secs)),
            ),
            upload_dir: server.upload_dir.clone(),
            processed_dir: server.processed_dir.clone(),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }
}

/// Body of `/check_status` and `/status/{id}`
#[derive(Debug, Serialize, PartialEq)]
pub struct StatusReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<RunStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    fn from_state(state: &RunState) -> Self {
        Self {
            status: state.status_label(),
            stage: match state {
                RunState::Running { stage } => Some(*stage),
                _ => None,
            },
            error: match state {
                RunState::Failed { reason } => Some(reason.clone()),
                _ => None,
            },
        }
    }

    fn bare(status: &'static str) -> Self {
        Self {
            status,
            stage: None,
            error: None,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.pipeline.config().max_upload_bytes();

    Router::new()
        .route("/", get(index).post(upload))
        .route("/processing", get(processing))
        .route("/check_status", get(check_status))
        .route("/status/:id", get(status_by_id))
        .route("/result", get(result))
        .route("/download/:id", get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind the configured address and serve until the process stops
pub async fn start_server(pipeline: Pipeline) -> Result<()> {
    let server = pipeline.config().server.clone();
    FileManager::ensure_dir(&server.upload_dir)?;
    FileManager::ensure_dir(&server.processed_dir)?;

    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", server.host, server.port))?;

    let app = router(AppState::new(pipeline));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Serving on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Run id stored in the session cookie, if any
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
        .map(|uuid| uuid.to_string())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn processing() -> Html<&'static str> {
    Html(PROCESSING_PAGE)
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("video") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let Some(format) = VideoFormat::from_file_name(&file_name) else {
            warn!("Rejected upload {:?}: only .webm and .mp4 are accepted", file_name);
            return Redirect::to("/").into_response();
        };

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                error!("Upload read error: {}", e);
                return Redirect::to("/").into_response();
            }
        };

        let id = Uuid::new_v4().to_string();
        let video_path = state.upload_dir.join(format!("{}.{}", id, format.extension()));

        if let Err(e) = FileManager::ensure_dir(&state.upload_dir) {
            error!("Failed to create upload directory: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        if let Err(e) = tokio::fs::write(&video_path, &data).await {
            error!("Failed to save upload: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        info!("Saved upload {} ({} bytes) as {:?}", file_name, data.len(), video_path);

        let pipeline = Arc::clone(&state.pipeline);
        let run_id = id.clone();
        state.registry.submit(id.clone(), move |handle| async move {
            pipeline
                .run(&run_id, &video_path, |stage| handle.set_stage(stage))
                .await
        });

        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        let mut response = Redirect::to("/processing").into_response();
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        return response;
    }

    Redirect::to("/").into_response()
}

fn report_for(state: &AppState, id: &str) -> StatusReport {
    if let Some(handle) = state.registry.get(id) {
        return StatusReport::from_state(&handle.state());
    }

    // Unknown to this process (e.g. after a restart): the artifact decides
    if FileManager::file_exists(FileManager::processed_path(&state.processed_dir, id)) {
        StatusReport::bare("complete")
    } else {
        StatusReport::bare("processing")
    }
}

async fn check_status(State(state): State<AppState>, headers: HeaderMap) -> Json<StatusReport> {
    match session_id(&headers) {
        Some(id) => Json(report_for(&state, &id)),
        None => Json(StatusReport::bare("processing")),
    }
}

async fn status_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match Uuid::parse_str(&id) {
        Ok(uuid) => Json(report_for(&state, &uuid.to_string())).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid run id").into_response(),
    }
}

async fn result(headers: HeaderMap) -> Response {
    match session_id(&headers) {
        Some(id) => Html(RESULT_PAGE.replace("{id}", &id)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

async fn download(State(state): State<AppState>, Path(id): Path<String>, req: Request) -> Response {
    // Only canonical ids reach the file system, so no traversal is possible
    let Ok(id) = Uuid::parse_str(&id).map(|uuid| uuid.to_string()) else {
        return (StatusCode::BAD_REQUEST, "Invalid video id").into_response();
    };

    let path = FileManager::processed_path(&state.processed_dir, &id);
    if !FileManager::file_exists(&path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match ServeFile::new(&path).oneshot(req).await {
        Ok(res) => {
            let mut response = res.into_response();
            let disposition = format!("attachment; filename=\"{}.mp4\"", id);
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
            }
            response
        }
        Err(err) => {
            error!("ServeFile error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>mathcast</title></head>
<body>
  <h1>Turn a math lecture into an animation</h1>
  <form method="post" enctype="multipart/form-data">
    <input type="file" name="video" accept=".webm,.mp4" required>
    <button type="submit">Upload</button>
  </form>
</body>
</html>
"#;

const PROCESSING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Processing - mathcast</title></head>
<body>
  <h1>Processing your video</h1>
  <p id="status">Working...</p>
  <script>
    async function poll() {
      const res = await fetch('/check_status');
      const body = await res.json();
      if (body.status === 'complete') {
        window.location = '/result';
        return;
      }
      if (body.status === 'failed') {
        document.getElementById('status').textContent = 'Failed: ' + (body.error || 'unknown error');
        return;
      }
      document.getElementById('status').textContent = 'Working... ' + (body.stage || '');
      setTimeout(poll, 3000);
    }
    poll();
  </script>
</body>
</html>
"#;

const RESULT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Result - mathcast</title></head>
<body>
  <h1>Your animation is ready</h1>
  <video src="/download/{id}" controls></video>
  <p><a href="/download/{id}">Download</a> or <a href="/">upload another video</a></p>
</body>
</html>
"#;
