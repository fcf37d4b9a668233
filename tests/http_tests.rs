use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use renderd::config::{LimitsConfig, RenderConfig};
use renderd::http::{router, AppState};
use renderd::pool::RenderPool;
use renderd::render::Renderer;

/// Serve fake audio/image fixtures on an ephemeral port.
async fn serve_inputs() -> String {
    let app = Router::new()
        .route("/audio.mp3", get(|| async { b"fake mp3".to_vec() }))
        .route("/scene.jpg", get(|| async { b"fake jpg".to_vec() }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Install an executable stand-in for ffmpeg that writes its output file.
fn write_fake_tool(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-ffmpeg");
    std::fs::write(
        &path,
        "#!/bin/sh\nfor last in \"$@\"; do :; done; printf rendered > \"$last\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn test_state(ffmpeg: &Path, work_root: &Path, capacity: usize, limits: LimitsConfig) -> AppState {
    let config = RenderConfig {
        ffmpeg: ffmpeg.to_string_lossy().into_owned(),
        work_root: work_root.to_path_buf(),
        job_timeout: Duration::from_secs(30),
        kill_grace: Duration::from_secs(1),
        fetch_timeout: Duration::from_secs(10),
    };
    AppState {
        pool: RenderPool::new(capacity),
        renderer: Arc::new(Renderer::new(config, limits.clone()).unwrap()),
        limits,
    }
}

fn valid_body(base: &str) -> String {
    json!({
        "size": {"w": 320, "h": 240},
        "fps": 24,
        "audio_url": format!("{base}/audio.mp3"),
        "scenes": [
            {"image_url": format!("{base}/scene.jpg"), "seconds": 1},
            {"image_url": format!("{base}/scene.jpg"), "seconds": 1}
        ]
    })
    .to_string()
}

fn post_render(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/render")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn root_reports_service_identity() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let app = router(test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        1,
        LimitsConfig::default(),
    ));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["service"], json!("renderd"));
}

#[tokio::test]
async fn health_endpoints_respond_ok() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let app = router(test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        1,
        LimitsConfig::default(),
    ));

    for uri in ["/health", "/healthz"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let app = router(test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        1,
        LimitsConfig::default(),
    ));

    let response = app.oneshot(post_render("not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], json!("validation"));
}

#[tokio::test]
async fn empty_scenes_are_rejected_before_any_work() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let state = test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        1,
        LimitsConfig::default(),
    );
    let pool = state.pool.clone();
    let app = router(state);

    let body = json!({"audio_url": "https://example.com/a.mp3", "scenes": []}).to_string();
    let response = app.oneshot(post_render(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], json!("validation"));
    // no slot was consumed for the rejected request
    assert_eq!(pool.available(), pool.capacity());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let limits = LimitsConfig {
        max_body_bytes: 256,
        ..LimitsConfig::default()
    };
    let app = router(test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        1,
        limits,
    ));

    let padding = "x".repeat(1024);
    let body = json!({"audio_url": "https://example.com/a.mp3", "note": padding, "scenes": []})
        .to_string();
    let response = app.oneshot(post_render(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exhausted_pool_returns_capacity_error() {
    let base = serve_inputs().await;
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let state = test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        1,
        LimitsConfig::default(),
    );
    let held = state.pool.try_acquire().unwrap();
    let app = router(state);

    let response = app
        .clone()
        .oneshot(post_render(valid_body(&base)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["kind"], json!("capacity"));

    // the slot frees and the same request goes through
    drop(held);
    let response = app.oneshot(post_render(valid_body(&base))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn successful_render_returns_the_artifact() {
    let base = serve_inputs().await;
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let state = test_state(
        &write_fake_tool(tools.path()),
        work.path(),
        2,
        LimitsConfig::default(),
    );
    let pool = state.pool.clone();
    let app = router(state);

    let response = app.oneshot(post_render(valid_body(&base))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "video/mp4"
    );
    assert_eq!(response.headers().get("x-render-scenes").unwrap(), "2");
    assert_eq!(response.headers().get("x-render-width").unwrap(), "320");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"rendered");

    // back to idle: all slots free, no workspace left behind
    assert_eq!(pool.available(), pool.capacity());
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}
