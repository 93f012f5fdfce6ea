//! Router-level integration tests driven with `tower::ServiceExt::oneshot`,
//! grounded on the teacher's pattern of exercising its `axum` server without
//! binding a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use memory_api::build_router;
use memory_api::state::AppState;
use memory_core::encoder::HashEncoder;
use memory_core::retrieval::RetrievalEngine;
use memory_core::worker::{WorkerPool, WorkerPoolConfig};
use memory_core::Config;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> axum::Router {
    let storage = test_utils::in_memory_storage().await;
    let encoder: Arc<dyn memory_core::encoder::TextEncoder> =
        Arc::new(HashEncoder::default());
    let retrieval = RetrievalEngine::new(
        Arc::clone(&storage),
        Arc::clone(&encoder),
        100,
        std::time::Duration::from_secs(60),
    );
    let worker_pool = Arc::new(WorkerPool::new(
        WorkerPoolConfig {
            worker_count: 1,
            batch_size: 10,
            poll_interval: std::time::Duration::from_millis(20),
            max_retries: 3,
            reaper_timeout: std::time::Duration::from_secs(60),
        },
        Arc::clone(&storage),
        encoder,
    ));
    worker_pool.start();

    let state = Arc::new(AppState::new(storage, retrieval, worker_pool, Config::from_env()));
    build_router(state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_empty_queue(app: &axum::Router) {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats = json_body(response).await;
        if stats["pending_jobs"] == 0 && stats["processing_jobs"] == 0 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("embedding queue never drained");
}

#[tokio::test]
async fn health_reports_healthy_on_an_empty_store() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn ingest_then_search_round_trip() {
    let app = test_app().await;

    // `HashEncoder` hashes each string independently and does not cluster
    // semantically related text, so the query has to be the exact ingested
    // content to reliably land above a similarity floor.
    let content = "vector databases enable semantic retrieval";
    let ingest_body = json!({
        "action_type": "note",
        "action_details": { "content": content },
        "tags": ["test"],
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/memory/action")
                .header("content-type", "application/json")
                .body(Body::from(ingest_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_for_empty_queue(&app).await;

    let search_body = json!({
        "query": content,
        "limit": 5,
        "min_similarity": 0.9,
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/memory/search")
                .header("content-type", "application/json")
                .body(Body::from(search_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = json_body(response).await;
    assert!(results.as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn fact_lookup_returns_not_found_for_unknown_fact_type() {
    let app = test_app().await;
    let request_body = json!({ "fact_type": "nexus_version" });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/memory/facts")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
