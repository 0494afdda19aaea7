use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::app::session::Session;
use crate::config::Config;
use crate::documents::document_id;
use crate::images::tests::create_png;
use crate::semantic::SearchEngine;
use crate::tests::fakes::{FixedOcr, HashingEmbedder};
use crate::web;

fn create_router() -> Router {
    let mut config = Config::default();
    config.vision.api_key_env = "SHOTSEARCH_TEST_UNSET_API_KEY".into();
    config.samples_dir = "/nonexistent/shotsearch-samples".into();

    let ocr = FixedOcr::new("")
        .with(40, "Login Portal Username Password")
        .with(41, "Error Authentication Failed");
    let engine = SearchEngine::with_embedder(
        config.search.clone(),
        Box::new(HashingEmbedder::new(512)),
    );

    web::router(Arc::new(Session::new_with(config, Box::new(ocr), None, engine)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn upload_body() -> Value {
    json!({
        "files": [
            {"filename": "login.png", "image_b64": STANDARD.encode(create_png(40, 20))},
            {"filename": "error.png", "image_b64": STANDARD.encode(create_png(41, 20))},
        ]
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_page() {
    let resp = create_router().oneshot(get("/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");

    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("Visual Memory Search"));
    assert!(html.contains("Upload &amp; Process"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_endpoint() {
    let resp = create_router().oneshot(get("/api/config")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let config = body_json(resp).await;
    assert_eq!(config["theme"], "light");
    assert_eq!(config["max_upload_size_mb"], 10);
    assert_eq!(config["max_files_per_batch"], 50);
    assert_eq!(config["mode"], "ocr_only");
    assert_eq!(config["example_queries"].as_array().unwrap().len(), 9);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_search_and_thumbnail() {
    let app = create_router();

    let resp = app
        .clone()
        .oneshot(post_json("/api/documents/upload", upload_body()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["indexed"], 2);
    assert_eq!(report["errors"].as_array().unwrap().len(), 0);

    let resp = app.clone().oneshot(get("/api/documents")).await.unwrap();
    let docs = body_json(resp).await;
    assert_eq!(docs.as_array().unwrap().len(), 2);
    assert_eq!(docs[0]["filename"], "login.png");

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/search",
            json!({"query": "authentication failed", "top_k": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let results = body_json(resp).await;
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["filename"], "error.png");

    let thumb_url = results[0]["thumbnail_url"].as_str().unwrap().to_string();
    assert_eq!(
        thumb_url,
        format!("/api/documents/{}/thumbnail", document_id("upload/error.png"))
    );

    let resp = app.clone().oneshot(get(&thumb_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/webp");
    assert!(crate::images::is_webp(&body_bytes(resp).await));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_responses() {
    let app = create_router();

    let resp = app
        .clone()
        .oneshot(get("/api/documents/unknown/thumbnail"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "document not found");

    let resp = app
        .clone()
        .oneshot(post_json("/api/search", json!({"query": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("empty"));

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/documents/upload",
            json!({"files": [{"filename": "a.png", "image_b64": "***not base64***"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["indexed"], 0);
    assert_eq!(report["errors"][0]["filename"], "a.png");
    assert!(report["errors"][0]["error"]
        .as_str()
        .unwrap()
        .contains("invalid base64"));

    let resp = app
        .clone()
        .oneshot(post_json("/api/documents/upload", json!({"files": []})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_base64_does_not_stop_the_batch() {
    let app = create_router();

    let body = json!({
        "files": [
            {"filename": "broken.png", "image_b64": "%%%"},
            {"filename": "login.png", "image_b64": STANDARD.encode(create_png(40, 20))},
        ]
    });
    let resp = app
        .clone()
        .oneshot(post_json("/api/documents/upload", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let report = body_json(resp).await;
    assert_eq!(report["indexed"], 1);
    assert_eq!(report["documents"][0]["filename"], "login.png");
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
    assert_eq!(report["errors"][0]["filename"], "broken.png");

    let docs = body_json(app.oneshot(get("/api/documents")).await.unwrap()).await;
    assert_eq!(docs.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_files_count_towards_batch_limit() {
    let mut config = Config::default();
    config.vision.api_key_env = "SHOTSEARCH_TEST_UNSET_API_KEY".into();
    config.upload.max_files_per_batch = 1;
    let engine = SearchEngine::with_embedder(
        config.search.clone(),
        Box::new(HashingEmbedder::new(512)),
    );
    let app = web::router(Arc::new(Session::new_with(
        config,
        Box::new(FixedOcr::new("text")),
        None,
        engine,
    )));

    let body = json!({
        "files": [
            {"filename": "broken.png", "image_b64": "%%%"},
            {"filename": "login.png", "image_b64": STANDARD.encode(create_png(40, 20))},
        ]
    });
    let resp = app
        .oneshot(post_json("/api/documents/upload", body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear_and_stats() {
    let app = create_router();

    app.clone()
        .oneshot(post_json("/api/documents/upload", upload_body()))
        .await
        .unwrap();

    let stats = body_json(app.clone().oneshot(get("/api/stats")).await.unwrap()).await;
    assert_eq!(stats["total_documents"], 2);
    assert_eq!(stats["model_name"], "hashing-test");

    let resp = app
        .clone()
        .oneshot(post_json("/api/clear", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = body_json(resp).await;
    assert_eq!(stats["total_documents"], 0);
    assert_eq!(stats["processing_time_secs"], 0.0);

    let docs = body_json(app.oneshot(get("/api/documents")).await.unwrap()).await;
    assert!(docs.as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_api_key_settings() {
    let app = create_router();

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/settings/api_key",
            json!({"api_key": "sk-ant-test"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = body_json(resp).await;
    assert_eq!(stats["mode"], "enhanced");
    assert_eq!(stats["api_key"], "session");

    let stats = body_json(
        app.clone()
            .oneshot(post_json("/api/settings/api_key", json!({"api_key": null})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(stats["mode"], "ocr_only");
    assert_eq!(stats["api_key"], "none");

    let resp = app
        .oneshot(post_json("/api/settings/api_key", json!({"api_key": ""})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_samples_missing_dir() {
    let resp = create_router()
        .oneshot(post_json("/api/documents/samples", json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
