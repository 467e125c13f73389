/*!
 * Web front end tests, driven through the router without binding a socket
 */

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use std::fs;
use std::time::Duration;
use tower::ServiceExt;
use mathcast::providers::MockProvider;
use mathcast::server::{AppState, SESSION_COOKIE, router};
use crate::common::{self, StubChecker};

const BOUNDARY: &str = "mathcast-test-boundary";

fn multipart_upload(file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"video\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(id) = cookie {
        builder = builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, id));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Run id from the Set-Cookie header of an upload response
fn cookie_id(response: &Response) -> Option<String> {
    let cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = cookie.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    (name == SESSION_COOKIE).then(|| value.to_string())
}

fn location(response: &Response) -> Option<&str> {
    response.headers().get(header::LOCATION)?.to_str().ok()
}

fn app(root: &std::path::Path, provider: MockProvider) -> (Router, AppState) {
    let state = AppState::new(common::test_pipeline(root, provider, StubChecker::always_valid()));
    (router(state.clone()), state)
}

/// Test the whole upload, poll, result and download flow
#[tokio::test]
async fn test_upload_withWebm_shouldCompleteAndServeDownload() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = MockProvider::scripted([common::TWO_SLIDE_TRANSCRIPT, common::LOOSE_SCENE_RESPONSE]);
    let (app, state) = app(temp_dir.path(), provider);

    let response = app.clone().oneshot(multipart_upload("lecture.webm", b"webm bytes")).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/processing"));
    let id = cookie_id(&response).expect("upload should set the session cookie");

    // The saved upload keeps the accepted extension
    let saved = temp_dir.path().join("uploads").join(format!("{}.webm", id));
    let handle = state.registry().get(&id).expect("run should be registered");
    handle.wait(Duration::from_millis(10)).await;
    assert!(saved.exists());

    let status = json_body(app.clone().oneshot(get("/check_status", Some(&id))).await?).await;
    assert_eq!(status["status"], "complete");

    let status = json_body(app.clone().oneshot(get(&format!("/status/{}", id), None)).await?).await;
    assert_eq!(status["status"], "complete");

    let result = app.clone().oneshot(get("/result", Some(&id))).await?;
    assert_eq!(result.status(), StatusCode::OK);
    let page = String::from_utf8(body_bytes(result).await)?;
    assert!(page.contains(&format!("/download/{}", id)));

    let download = app.clone().oneshot(get(&format!("/download/{}", id), None)).await?;
    assert_eq!(download.status(), StatusCode::OK);
    let disposition = download
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains(&format!("{}.mp4", id)));
    assert_eq!(body_bytes(download).await, common::FAKE_VIDEO);
    Ok(())
}

/// Test that a non-video upload is refused and starts nothing
#[tokio::test]
async fn test_upload_withTextFile_shouldRedirectHomeWithoutRun() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, state) = app(temp_dir.path(), MockProvider::scripted(["unused"]));

    let response = app.oneshot(multipart_upload("notes.txt", b"hello")).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    assert!(cookie_id(&response).is_none());
    assert!(state.registry().is_empty());
    Ok(())
}

/// Test that a failed run reports its reason to the poller
#[tokio::test]
async fn test_checkStatus_withFailedRun_shouldReportFailure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, state) = app(temp_dir.path(), MockProvider::scripted(["no slides here"]));

    let response = app.clone().oneshot(multipart_upload("lecture.mp4", b"mp4 bytes")).await?;
    let id = cookie_id(&response).expect("upload should set the session cookie");
    state
        .registry()
        .get(&id)
        .expect("run should be registered")
        .wait(Duration::from_millis(10))
        .await;

    let status = json_body(app.oneshot(get("/check_status", Some(&id))).await?).await;
    assert_eq!(status["status"], "failed");
    assert!(status["error"].as_str().unwrap_or_default().contains("No slides"));
    Ok(())
}

/// Test the polling answer when the client has no session
#[tokio::test]
async fn test_checkStatus_withoutSession_shouldSayProcessing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, _) = app(temp_dir.path(), MockProvider::echo());

    let status = json_body(app.oneshot(get("/check_status", None)).await?).await;
    assert_eq!(status["status"], "processing");
    Ok(())
}

/// Test that a published file alone is enough to report completion
#[tokio::test]
async fn test_checkStatus_withPublishedFileFromEarlierProcess_shouldSayComplete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, _) = app(temp_dir.path(), MockProvider::echo());

    let id = "1f0e2d3c-4b5a-4697-8876-5a4b3c2d1e0f";
    let processed = temp_dir.path().join("processed");
    fs::create_dir_all(&processed)?;
    fs::write(processed.join(format!("{}.mp4", id)), common::FAKE_VIDEO)?;

    let status = json_body(app.clone().oneshot(get("/check_status", Some(id))).await?).await;
    assert_eq!(status["status"], "complete");

    let unknown = json_body(
        app.oneshot(get("/check_status", Some("2f0e2d3c-4b5a-4697-8876-5a4b3c2d1e0f")))
            .await?,
    )
    .await;
    assert_eq!(unknown["status"], "processing");
    Ok(())
}

/// Test that non-canonical spellings of a run id still find the run
#[tokio::test]
async fn test_checkStatus_withUppercaseOrBracedCookie_shouldFindRun() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, state) = app(temp_dir.path(), MockProvider::scripted(["no slides here"]));

    let response = app.clone().oneshot(multipart_upload("lecture.mp4", b"mp4 bytes")).await?;
    let id = cookie_id(&response).expect("upload should set the session cookie");
    state
        .registry()
        .get(&id)
        .expect("run should be registered")
        .wait(Duration::from_millis(10))
        .await;

    for spelling in [id.to_uppercase(), format!("{{{}}}", id), format!("urn:uuid:{}", id)] {
        let status = json_body(app.clone().oneshot(get("/check_status", Some(&spelling))).await?).await;
        assert_eq!(status["status"], "failed", "cookie spelling {}", spelling);
    }

    let status = json_body(app.oneshot(get(&format!("/status/{}", id.to_uppercase()), None)).await?).await;
    assert_eq!(status["status"], "failed");
    Ok(())
}

/// Test the download guards
#[tokio::test]
async fn test_download_withBadOrUnknownId_shouldRefuse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, _) = app(temp_dir.path(), MockProvider::echo());

    let bad = app.clone().oneshot(get("/download/..%2F..%2Fconf.json", None)).await?;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .clone()
        .oneshot(get("/download/3f0e2d3c-4b5a-4697-8876-5a4b3c2d1e0f", None))
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bad_status = app.oneshot(get("/status/not-a-uuid", None)).await?;
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_pages_shouldServeHtml() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (app, _) = app(temp_dir.path(), MockProvider::echo());

    let index = app.clone().oneshot(get("/", None)).await?;
    assert_eq!(index.status(), StatusCode::OK);
    assert!(String::from_utf8(body_bytes(index).await)?.contains("name=\"video\""));

    let processing = app.clone().oneshot(get("/processing", None)).await?;
    assert!(String::from_utf8(body_bytes(processing).await)?.contains("/check_status"));

    let result = app.oneshot(get("/result", None)).await?;
    assert_eq!(result.status(), StatusCode::SEE_OTHER);
    Ok(())
}
