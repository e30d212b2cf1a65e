use std::path::PathBuf;
use std::sync::atomic::Ordering;

use axum::{body::Body, http::Request, http::StatusCode};
use tower::ServiceExt;

#[tokio::test]
async fn readyz_unavailable_while_shutting_down() {
    let resources = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../resources");
    let state = jf_api::test_state("test-key", resources);
    state.readiness.store(false, Ordering::SeqCst);
    let app = jf_api::create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
