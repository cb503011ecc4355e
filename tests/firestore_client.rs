//! Firestore REST client against an in-process mock of the token endpoint
//! and the documents API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{DecodingKey, Validation};
use serde_json::{json, Value};

use trust_game_analysis::store::auth::{
    Authenticator, Claims, ServiceAccountKey, DATASTORE_SCOPE,
};
use trust_game_analysis::store::firestore::{Firestore, DEFAULT_DATABASE};
use trust_game_analysis::{
    load_and_build, DashboardError, DocumentStore, FetchError, IncompleteTrialPolicy,
};

const KEY_JSON: &str = include_str!("fixtures/test-service-account.json");
const PUBLIC_PEM: &str = include_str!("fixtures/test-service-account.pub.pem");
const ACCESS_TOKEN: &str = "ya29.test-token";

#[derive(Clone, Default)]
struct Mock {
    token_requests: Arc<AtomicUsize>,
    document_requests: Arc<AtomicUsize>,
    token_uri: Arc<std::sync::Mutex<String>>,
}

fn typed_group_document() -> Value {
    let trial = |e: i64, ie: i64, ic: i64, te: i64, tc: f64| {
        json!({"mapValue": {"fields": {
            "endowment": {"integerValue": e.to_string()},
            "I_1ST_ORDER_EXPECTATION": {"integerValue": ie.to_string()},
            "I_CHOICE": {"integerValue": ic.to_string()},
            "T_2ND_ORDER_EXPECTATION": {"integerValue": te.to_string()},
            "T_CHOICE": {"doubleValue": tc},
        }}})
    };
    json!({
        "name": "projects/trust-game-demo/databases/(default)/documents/groups/000",
        "fields": {
            "groupId": {"stringValue": "000"},
            "I_name": {"stringValue": "Ada"},
            "T_name": {"stringValue": "Grace"},
            "currentState": {"stringValue": "T_CHOICE"},
            "currentTrial": {"integerValue": "2"},
            "createdAt": {"timestampValue": "2023-01-05T10:00:00Z"},
            "trials": {"arrayValue": {"values": [
                trial(10, 5, 3, 8, 12.0),
                trial(10, 7, 6, 10, 15.0),
            ]}}
        },
        "createTime": "2023-01-05T10:00:00Z",
        "updateTime": "2023-01-05T10:05:00Z"
    })
}

async fn token(
    State(mock): State<Mock>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    mock.token_requests.fetch_add(1, Ordering::SeqCst);
    let grant = form.get("grant_type").map(String::as_str);
    if grant != Some("urn:ietf:params:oauth:grant-type:jwt-bearer") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        );
    }
    let Some(assertion) = form.get("assertion") else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_request"})));
    };
    let expected_aud = mock.token_uri.lock().unwrap().clone();
    let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.set_audience(&[expected_aud]);
    let key = DecodingKey::from_rsa_pem(PUBLIC_PEM.as_bytes()).unwrap();
    match jsonwebtoken::decode::<Claims>(assertion, &key, &validation) {
        Ok(data) if data.claims.scope == DATASTORE_SCOPE => (
            StatusCode::OK,
            Json(json!({"access_token": ACCESS_TOKEN, "expires_in": 3599, "token_type": "Bearer"})),
        ),
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))),
    }
}

async fn document(
    State(mock): State<Mock>,
    Path((project, _database, collection, doc)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    mock.document_requests.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if auth != format!("Bearer {}", ACCESS_TOKEN) && auth != "Bearer owner" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": 401, "message": "bad token", "status": "UNAUTHENTICATED"}})),
        );
    }
    if project != "trust-game-demo" || collection != "groups" || doc != "000" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "message": "no such document", "status": "NOT_FOUND"}})),
        );
    }
    (StatusCode::OK, Json(typed_group_document()))
}

async fn spawn_mock() -> (String, Mock) {
    let mock = Mock::default();
    let app = Router::new()
        .route("/token", post(token))
        .route(
            "/v1/projects/:project/databases/:database/documents/:collection/:doc",
            get(document),
        )
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve mock") });
    let base = format!("http://{}", addr);
    *mock.token_uri.lock().unwrap() = format!("{}/token", base);
    (base, mock)
}

fn service_account_client(base: &str) -> Firestore {
    let mut key = ServiceAccountKey::parse(KEY_JSON).expect("fixture key parses");
    key.token_uri = format!("{}/token", base);
    Firestore::new(
        format!("{}/v1", base),
        key.project_id.clone(),
        DEFAULT_DATABASE,
        Authenticator::service_account(key),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn fetch_decodes_typed_document() {
    let (base, mock) = spawn_mock().await;
    let store = service_account_client(&base);

    let doc = store.fetch("groups", "000").await.unwrap();
    assert_eq!(doc["groupId"], "000");
    assert_eq!(doc["currentTrial"], 2);
    assert_eq!(doc["createdAt"], "2023-01-05T10:00:00Z");
    assert_eq!(doc["trials"][0]["endowment"], 10);
    assert_eq!(doc["trials"][1]["T_CHOICE"], 15.0);
    assert_eq!(mock.token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn access_token_is_reused_until_expiry() {
    let (base, mock) = spawn_mock().await;
    let store = service_account_client(&base);

    store.fetch("groups", "000").await.unwrap();
    store.fetch("groups", "000").await.unwrap();
    assert_eq!(mock.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(mock.document_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let (base, _mock) = spawn_mock().await;
    let store = service_account_client(&base);

    let err = store.fetch("groups", "999").await.unwrap_err();
    match err {
        FetchError::NotFound { collection, document } => {
            assert_eq!(collection, "groups");
            assert_eq!(document, "999");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn rejected_token_is_auth_error() {
    let (base, _mock) = spawn_mock().await;
    let store = Firestore::new(
        format!("{}/v1", base),
        "trust-game-demo",
        DEFAULT_DATABASE,
        Authenticator::service_account({
            let mut key = ServiceAccountKey::parse(KEY_JSON).unwrap();
            // token endpoint rejects assertions with the wrong audience
            key.token_uri = format!("{}/token?aud=other", base);
            key
        }),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = store.fetch("groups", "000").await.unwrap_err();
    assert!(matches!(err, FetchError::Auth(_)), "got {err}");
}

#[tokio::test]
async fn emulator_mode_skips_token_exchange() {
    let (base, mock) = spawn_mock().await;
    let store = Firestore::new(
        format!("{}/v1", base),
        "trust-game-demo",
        DEFAULT_DATABASE,
        Authenticator::Emulator,
        Duration::from_secs(5),
    )
    .unwrap();

    let dashboard = load_and_build(&store, "groups", "000", IncompleteTrialPolicy::Fatal)
        .await
        .unwrap();
    assert_eq!(dashboard.table.len(), 2);
    assert_eq!(dashboard.group.investor_name, "Ada");
    assert_eq!(mock.token_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_store_is_a_network_error() {
    // bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = Firestore::new(
        format!("http://{}/v1", addr),
        "trust-game-demo",
        DEFAULT_DATABASE,
        Authenticator::Emulator,
        Duration::from_secs(2),
    )
    .unwrap();
    let err = load_and_build(&store, "groups", "000", IncompleteTrialPolicy::Fatal)
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::Fetch(FetchError::Network(_))));
}
