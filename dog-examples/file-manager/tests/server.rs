use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dog_upload::UploadConfig;
use file_manager::ServerSettings;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn settings(root: &std::path::Path) -> ServerSettings {
    ServerSettings {
        upload_root: root.to_path_buf(),
        sweep_every: Duration::from_millis(10),
        ..ServerSettings::default()
    }
}

#[tokio::test]
async fn health_route_answers() {
    let root = tempfile::tempdir().unwrap();
    let chunks = tempfile::tempdir().unwrap();
    let app = file_manager::build(
        &settings(root.path()),
        UploadConfig::new().with_chunk_dir(chunks.path()),
    );

    let res = app
        .into_router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn sweeper_removes_abandoned_sessions() {
    let root = tempfile::tempdir().unwrap();
    let chunks = tempfile::tempdir().unwrap();
    std::fs::create_dir(chunks.path().join("abandoned-session")).unwrap();

    let config = UploadConfig::new()
        .with_chunk_dir(chunks.path())
        .with_chunk_expiry(Duration::ZERO);
    let app = file_manager::build(&settings(root.path()), config);

    let sweeper = file_manager::spawn_chunk_sweeper(
        std::sync::Arc::clone(&app.state.uploader),
        Duration::from_millis(10),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    sweeper.abort();

    assert!(!chunks.path().join("abandoned-session").exists());
}
