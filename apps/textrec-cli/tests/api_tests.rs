use std::fs;
use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use textrec_cli::api::{create_router, AppState};
use textrec_core::config::{BuildSettings, ServeSettings};
use textrec_search::run_build;

const POSTS: &str = "\
text,author
Baking sourdough bread at home,dee
A beginner's guide to wild yeast bread,ed
Sourdough starter feeding schedule,jo
Training for your first marathon,gus
Interval running workouts to build speed,hal
Choosing running shoes for long distances,ivy
";

struct Fixture {
    _tmp: TempDir,
    build: BuildSettings,
    serve: ServeSettings,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().expect("tempdir");
    let data: PathBuf = tmp.path().join("posts.csv");
    fs::write(&data, POSTS).expect("write csv");
    let models = tmp.path().join("models");
    let build = BuildSettings {
        n_components: 8,
        n_trees: 4,
        leaf_size: 2,
        text_data_path: data.clone(),
        models_dir: models.clone(),
        ..BuildSettings::default()
    };
    let serve = ServeSettings { models_dir: models, text_data_path: data, ..ServeSettings::default() };
    Fixture { _tmp: tmp, build, serve }
}

/// Serve `state` on an ephemeral port and return the base URL.
async fn spawn(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn recommend(base: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/recommend"))
        .json(&body)
        .send()
        .await
        .expect("request");
    let status = resp.status();
    (status, resp.json().await.expect("json body"))
}

async fn health(base: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(format!("{base}/health")).await.expect("request");
    let status = resp.status();
    (status, resp.json().await.expect("json body"))
}

fn built(fx: &Fixture) -> String {
    run_build(&fx.build).expect("build").build_id
}

#[tokio::test]
async fn recommend_returns_nearest_records() {
    let fx = fixture();
    built(&fx);
    let base = spawn(AppState::load(fx.serve.clone())).await;

    let (status, body) = recommend(&base, json!({"text": "sourdough bread", "top_k": 2})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["query"], "sourdough bread");
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["text"].as_str().is_some_and(|t| t.contains("read") || t.contains("ourdough"))));
    assert!(results[0]["author"].is_string());

    // default top_k
    let (_, body) = recommend(&base, json!({"text": "running"})).await;
    assert_eq!(body["results"].as_array().map(Vec::len), Some(5));

    // larger than the corpus
    let (_, body) = recommend(&base, json!({"text": "running", "top_k": 100})).await;
    assert_eq!(body["results"].as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn invalid_requests_are_bad_requests() {
    let fx = fixture();
    built(&fx);
    let base = spawn(AppState::load(fx.serve.clone())).await;

    for body in [
        json!({"text": ""}),
        json!({"text": "bread", "top_k": 0}),
        json!({"text": "bread", "top_k": 101}),
        json!({"top_k": 3}),
    ] {
        let (status, resp) = recommend(&base, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(resp["error"].is_string(), "{resp}");
    }
}

#[tokio::test]
async fn health_reports_the_loaded_build() {
    let fx = fixture();
    let build_id = built(&fx);
    let base = spawn(AppState::load(fx.serve.clone())).await;

    let (status, body) = health(&base).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["build_id"], build_id.as_str());
    assert_eq!(body["components"], json!({"text_model": true, "database": false}));
}

#[tokio::test]
async fn missing_artifacts_answer_service_unavailable() {
    let fx = fixture();
    let base = spawn(AppState::load(fx.serve.clone())).await;

    let (status, body) = health(&base).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["components"]["text_model"], false);

    let (status, body) = recommend(&base, json!({"text": "bread"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    // without hot reload a later build is not picked up
    built(&fx);
    let (status, _) = health(&base).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn hot_reload_swaps_in_a_new_build() {
    let fx = fixture();
    let first = built(&fx);
    let serve = ServeSettings { hot_reload: true, ..fx.serve.clone() };
    let base = spawn(AppState::load(serve)).await;
    assert_eq!(health(&base).await.1["build_id"], first.as_str());

    let second = run_build(&BuildSettings { n_trees: 6, ..fx.build.clone() }).expect("rebuild").build_id;
    assert_ne!(first, second);
    assert_eq!(health(&base).await.1["build_id"], second.as_str());

    let (status, _) = recommend(&base, json!({"text": "marathon"})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn hot_reload_recovers_from_a_missing_set() {
    let fx = fixture();
    let serve = ServeSettings { hot_reload: true, ..fx.serve.clone() };
    let base = spawn(AppState::load(serve)).await;
    assert_eq!(health(&base).await.0, StatusCode::SERVICE_UNAVAILABLE);

    let id = built(&fx);
    let (status, body) = health(&base).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["build_id"], id.as_str());
    assert!(Path::new(&fx.serve.models_dir).is_dir());
}

#[tokio::test]
async fn hot_reload_does_not_retry_an_unloadable_build() {
    let fx = fixture();
    let first = built(&fx);
    let serve = ServeSettings { hot_reload: true, ..fx.serve.clone() };
    let base = spawn(AppState::load(serve)).await;

    // a build over a different corpus cannot be served with the configured one
    let edited = fx.serve.text_data_path.with_file_name("edited.csv");
    fs::write(&edited, POSTS.replace("Baking sourdough", "Baking rye")).expect("write csv");
    run_build(&BuildSettings { text_data_path: edited.clone(), ..fx.build.clone() }).expect("edited build");
    let (status, body) = health(&base).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["build_id"], first.as_str());

    // now that build would load, but it already failed once and is not retried
    fs::copy(&edited, &fx.serve.text_data_path).expect("replace corpus");
    assert_eq!(health(&base).await.1["build_id"], first.as_str());
    let (status, _) = recommend(&base, json!({"text": "bread"})).await;
    assert_eq!(status, StatusCode::OK);

    // a newer build is picked up
    let third = run_build(&BuildSettings { n_trees: 5, ..fx.build.clone() }).expect("third build").build_id;
    assert_eq!(health(&base).await.1["build_id"], third.as_str());
}
