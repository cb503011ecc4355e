//! End-to-end smoke tests: a fixture directory behind the HTTP server.

use std::path::Path;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use trust_game_analysis::server::{build_router, AppState, ServerOptions};
use trust_game_analysis::store::fixture::FixtureStore;
use trust_game_analysis::{load_and_build, IncompleteTrialPolicy};

fn group(investor: &str, trials: Value) -> Value {
    json!({
        "groupId": "000",
        "I_name": investor,
        "T_name": "Trustee Demo",
        "currentState": "T_CHOICE",
        "currentTrial": 3,
        "trials": trials,
    })
}

fn valid_trials() -> Value {
    json!([
        {"endowment": 10, "I_1ST_ORDER_EXPECTATION": 5, "I_CHOICE": 3, "T_2ND_ORDER_EXPECTATION": 8, "T_CHOICE": 12},
        {"endowment": 10, "I_1ST_ORDER_EXPECTATION": 6, "I_CHOICE": 5, "T_2ND_ORDER_EXPECTATION": 14, "T_CHOICE": 15},
        {"endowment": 10, "I_1ST_ORDER_EXPECTATION": 8, "I_CHOICE": 7, "T_2ND_ORDER_EXPECTATION": 20, "T_CHOICE": 25},
    ])
}

fn write_doc(root: &Path, document: &str, body: &Value) {
    let dir = root.join("groups");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.json", document)), body.to_string()).unwrap();
}

async fn spawn(root: &Path, document: &str, policy: IncompleteTrialPolicy) -> String {
    let state = AppState::new(
        Arc::new(FixtureStore::new(root)),
        ServerOptions {
            collection: "groups".to_string(),
            document: document.to_string(),
            policy,
            preview_rows: 5,
            refresh_on_view: false,
        },
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, build_router(state)).await.unwrap() });
    format!("http://{}", addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn page_shows_group_preview_and_plots() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "000", &group("Investor Demo", valid_trials()));
    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Fatal).await;

    let resp = client().get(&base).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("etag"));
    let html = resp.text().await.unwrap();
    assert!(html.contains("Group ID: 000"));
    assert!(html.contains("Investor Demo"));
    assert!(html.contains("Investor Expectation"));
    assert!(html.contains("Showing 3 of 3 trials."));
    assert_eq!(html.matches("<svg").count(), 3);
    assert!(html.contains("Click to open"));
    assert!(html.contains(r#"action="/refresh""#));
}

#[tokio::test]
async fn view_serves_snapshot_until_refresh() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "000", &group("Before", valid_trials()));
    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Fatal).await;
    let http = client();

    let first = http.get(&base).send().await.unwrap().text().await.unwrap();
    assert!(first.contains("Before"));

    write_doc(dir.path(), "000", &group("After", valid_trials()));
    let cached = http.get(&base).send().await.unwrap().text().await.unwrap();
    assert!(cached.contains("Before"));

    let resp = http.post(format!("{}/refresh", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/");

    let fresh = http.get(&base).send().await.unwrap().text().await.unwrap();
    assert!(fresh.contains("After"));
    assert!(!fresh.contains("Before"));
}

#[tokio::test]
async fn table_endpoint_returns_derived_columns() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "000", &group("Investor Demo", valid_trials()));
    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Fatal).await;

    let body: Value = client()
        .get(format!("{}/api/table", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["rows"].as_array().unwrap().len(), 3);
    let first = &body["rows"][0];
    assert_eq!(first["Investor Expectation"], 50.0);
    assert_eq!(first["Investor Behavior"], 30.0);
    assert_eq!(first["Trustee Expectation"], 20.0);
    assert_eq!(first["Trustee Behavior"], 30.0);
    assert_eq!(first["endowment"], 10);

    let doc: Value = client()
        .get(format!("{}/api/document", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(doc["I_name"], "Investor Demo");
    assert_eq!(doc["trials"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn health_needs_no_document() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Fatal).await;

    let body: Value = client()
        .get(format!("{}/api/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_document_renders_no_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn(dir.path(), "404", IncompleteTrialPolicy::Fatal).await;

    let resp = client().get(&base).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let html = resp.text().await.unwrap();
    assert!(html.contains("groups/404"));
    assert!(!html.contains("<svg"));
    assert!(!html.contains("Group ID"));
}

#[tokio::test]
async fn incomplete_trial_is_fatal_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let mut trials = valid_trials();
    trials[1].as_object_mut().unwrap().remove("T_CHOICE");
    write_doc(dir.path(), "000", &group("Investor Demo", trials));

    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Fatal).await;
    let resp = client().get(&base).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.text().await.unwrap().contains("T_CHOICE"));

    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Exclude).await;
    let html = client().get(&base).send().await.unwrap().text().await.unwrap();
    assert!(html.contains("Showing 2 of 2 trials."));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "000", &group("Kept", valid_trials()));
    let base = spawn(dir.path(), "000", IncompleteTrialPolicy::Fatal).await;
    let http = client();

    assert!(http.get(&base).send().await.unwrap().text().await.unwrap().contains("Kept"));

    std::fs::remove_file(dir.path().join("groups").join("000.json")).unwrap();
    let resp = http.post(format!("{}/refresh", base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let html = http.get(&base).send().await.unwrap().text().await.unwrap();
    assert!(html.contains("Kept"));
}

#[tokio::test]
async fn demo_document_builds() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("demo");
    let store = FixtureStore::new(root);
    let dashboard = load_and_build(&store, "groups", "000", IncompleteTrialPolicy::Fatal)
        .await
        .unwrap();
    assert_eq!(dashboard.group.group_id, "000");
    assert_eq!(dashboard.table.len(), 8);
    assert_eq!(dashboard.table.rows[0].number("Investor Expectation"), Some(50.0));
    assert_eq!(dashboard.plots().len(), 3);
}
