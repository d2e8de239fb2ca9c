use auroraseek_core::{EngineConfig, HttpReranker, InvertedIndex, NoopReranker, QueryEngine, Reranker};
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_app, seed_index, AppState};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::net::TcpListener;

const TOKEN: &str = "secret";

fn app_with(reranker: Arc<dyn Reranker>) -> (Router, Arc<InvertedIndex>) {
    let index = Arc::new(InvertedIndex::new());
    let engine = QueryEngine::new(index.clone(), reranker, EngineConfig::default());
    (build_app(AppState::new(engine, Some(TOKEN.to_string()))), index)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = tower::ServiceExt::oneshot(app, req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn batch(docs: Value, token: Option<&str>) -> Request<Body> {
    let mut req = Request::post("/index/batch").header("content-type", "application/json");
    if let Some(t) = token {
        req = req.header("X-ADMIN-TOKEN", t);
    }
    req.body(Body::from(docs.to_string())).unwrap()
}

fn result_ids(json: &Value) -> Vec<String> {
    json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (app, _) = app_with(Arc::new(NoopReranker));
    let docs = json!([
        {"id": "doc0", "url": "https://a", "title": "Rust", "body": "Rust is great. rust systems programming."},
        {"id": "doc1", "url": "https://b", "title": "Learning", "body": "Learning rust takes a while, with many long detours."},
        {"id": "doc2", "url": "https://c", "title": "Gardening", "body": "Tomatoes."}
    ]);
    let (status, body) = call(app.clone(), batch(docs, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["indexed"], 3);

    let (status, json) = get(app, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result_ids(&json), vec!["doc0", "doc1"]);
    assert_eq!(json["total_hits"], 2);
    assert_eq!(json["results"][0]["url"], "https://a");
    assert!(json["results"][0]["score"].as_f64().unwrap() > json["results"][1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn empty_index_and_odd_k() {
    let (app, index) = app_with(Arc::new(NoopReranker));
    let (status, json) = get(app.clone(), "/search?q=anything").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["results"].as_array().unwrap().is_empty());

    index.add_document("1", "", "cat dog", "cat cat");
    let (_, json) = get(app.clone(), "/search?q=cat&k=-3").await;
    assert!(json["results"].as_array().unwrap().is_empty());
    let (_, json) = get(app, "/search?q=cat").await;
    assert_eq!(result_ids(&json), vec!["1"]);
}

#[tokio::test]
async fn batch_requires_admin_token() {
    let (app, index) = app_with(Arc::new(NoopReranker));
    let docs = json!([{"id": "x", "title": "t", "body": "b"}]);
    let (status, _) = call(app.clone(), batch(docs.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(app, batch(docs, Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(index.is_empty());
}

#[tokio::test]
async fn batch_drops_malformed_pages() {
    let (app, index) = app_with(Arc::new(NoopReranker));
    let docs = json!([{"ID": "ok", "Title": "fine"}, {"title": "no id"}, 42]);
    let (status, body) = call(app, batch(docs, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["indexed"], 1);
    assert_eq!(body["dropped"], 2);
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn doc_and_stats_endpoints() {
    let (app, index) = app_with(Arc::new(NoopReranker));
    index.add_document("a", "https://a", "one two", "three");
    index.add_document("b", "https://b", "one", "");

    let (status, json) = get(app.clone(), "/doc/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "one two");
    assert_eq!(json["length"], 3);

    let (status, json) = get(app.clone(), "/doc/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not found");

    let (_, json) = get(app, "/stats").await;
    assert_eq!(json["num_docs"], 2);
    assert_eq!(json["avg_doc_len"], 2.0);
    assert_eq!(json["num_terms"], 3);
}

#[tokio::test]
async fn rerank_endpoint_orders_by_similarity() {
    let (app, _) = app_with(Arc::new(NoopReranker));
    let req = json!({
        "query": "rust borrow",
        "candidates": [
            {"id": "far", "title": "cooking", "body": "pasta"},
            {"id": "near", "title": "rust", "body": "borrow checker"}
        ]
    });
    let (status, body) = call(
        app,
        Request::post("/rerank").header("content-type", "application/json").body(Body::from(req.to_string())).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["order"], json!(["near", "far"]));
}

fn load_disagreeing_pages(index: &InvertedIndex) {
    // BM25 prefers "heavy" (tf 10); bag-of-words cosine prefers "pure".
    index.add_document("heavy", "", "rust", &format!("{}alpha beta gamma", "rust ".repeat(9)));
    index.add_document("pure", "", "rust", "");
}

#[tokio::test]
async fn http_reranker_reorders_results() {
    // One instance serves /rerank for the engine under test.
    let (rerank_app, _) = app_with(Arc::new(NoopReranker));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, rerank_app).await.unwrap();
    });

    let remote = HttpReranker::new(format!("http://{addr}/rerank"), Duration::from_secs(5)).unwrap();
    let (app, index) = app_with(Arc::new(remote));
    load_disagreeing_pages(&index);

    let (_, json) = get(app, "/search?q=rust&k=5").await;
    assert_eq!(json["reranked"], true);
    assert_eq!(result_ids(&json), vec!["pure", "heavy"]);

    let (plain, index) = app_with(Arc::new(NoopReranker));
    load_disagreeing_pages(&index);
    let (_, json) = get(plain, "/search?q=rust&k=5").await;
    assert_eq!(result_ids(&json), vec!["heavy", "pure"]);
}

#[tokio::test]
async fn unreachable_reranker_falls_back() {
    let remote = HttpReranker::new("http://127.0.0.1:1/rerank", Duration::from_millis(500)).unwrap();
    let (app, index) = app_with(Arc::new(remote));
    load_disagreeing_pages(&index);

    let (status, json) = get(app, "/search?q=rust&k=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reranked"], false);
    assert_eq!(result_ids(&json), vec!["heavy", "pure"]);
}

/// Serve `stub` on an ephemeral port and return a reranker pointed at it.
async fn stub_reranker(stub: Router) -> HttpReranker {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });
    HttpReranker::new(format!("http://{addr}/rerank"), Duration::from_secs(5)).unwrap()
}

async fn search_against(stub: Router) -> Value {
    let remote = stub_reranker(stub).await;
    let (app, index) = app_with(Arc::new(remote));
    load_disagreeing_pages(&index);
    let (status, json) = get(app, "/search?q=rust&k=5").await;
    assert_eq!(status, StatusCode::OK);
    json
}

#[tokio::test]
async fn reranker_server_error_falls_back() {
    let stub = Router::new().route("/rerank", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let json = search_against(stub).await;
    assert_eq!(json["reranked"], false);
    assert_eq!(result_ids(&json), vec!["heavy", "pure"]);
}

#[tokio::test]
async fn reranker_garbage_body_falls_back() {
    let stub = Router::new().route("/rerank", post(|| async { "not json" }));
    let json = search_against(stub).await;
    assert_eq!(json["reranked"], false);
    assert_eq!(result_ids(&json), vec!["heavy", "pure"]);
}

#[tokio::test]
async fn reranker_empty_order_falls_back() {
    let stub = Router::new().route("/rerank", post(|| async { Json(json!({"order": []})) }));
    let json = search_against(stub).await;
    assert_eq!(json["reranked"], false);
    assert_eq!(result_ids(&json), vec!["heavy", "pure"]);
}

#[tokio::test]
async fn reranker_unknown_ids_do_not_count_as_rerank() {
    let stub = Router::new().route("/rerank", post(|| async { Json(json!({"order": ["zz"]})) }));
    let json = search_against(stub).await;
    assert_eq!(json["reranked"], false);
    assert_eq!(result_ids(&json), vec!["heavy", "pure"]);
}

#[test]
fn seed_index_loads_files() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("pages.jsonl"),
        "{\"id\":\"1\",\"url\":\"https://example.com\",\"title\":\"Example Domain\",\"body\":\"illustrative examples\"}\nbroken\n",
    )
    .unwrap();
    let index = InvertedIndex::new();
    let added = seed_index(&index, &[dir.path().to_path_buf()]).unwrap();
    assert_eq!(added, 1);
    assert!(index.get("1").is_some());
}
