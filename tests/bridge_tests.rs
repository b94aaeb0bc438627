//! Proxy bridge tests against a stub backend: status/header/body passthrough
//! and the structured 502 when the backend is unreachable.

use std::net::SocketAddr;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use gemgate::bridge::{app, AppState};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn stub_backend() -> Router {
    Router::new()
        .route(
            "/sales/",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                (StatusCode::OK, Json(json!({ "auth": auth })))
            })
            .post(|body: String| async move { (StatusCode::OK, body) }),
        )
        .route("/needs-auth", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/echo", axum::routing::post(|body: String| async move { body }))
}

async fn spawn_bridge(backend: SocketAddr) -> SocketAddr {
    let state = AppState::new(&format!("http://{}", backend)).unwrap();
    serve(app(state)).await
}

#[tokio::test]
async fn forwards_auth_header_and_relays_status_verbatim() {
    let backend = serve(stub_backend()).await;
    let bridge = spawn_bridge(backend).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/api/sales/", bridge))
        .header("authorization", "Bearer tok-xyz")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.get("auth").and_then(|a| a.as_str()), Some("Bearer tok-xyz"));

    let resp = client.get(format!("http://{}/api/needs-auth", bridge)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client.get(format!("http://{}/api/boom", bridge)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn json_body_passes_through_on_post() {
    let backend = serve(stub_backend()).await;
    let bridge = spawn_bridge(backend).await;

    let record = json!({
        "date": "2024-11-02",
        "customer": "R. Mehta",
        "total": 18250.0,
        "pay_mode": "upi"
    });
    let resp = reqwest::Client::new()
        .post(format!("http://{}/api/sales/", bridge))
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let echoed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(echoed, record);
}

#[tokio::test]
async fn form_body_passes_through_unchanged() {
    let backend = serve(stub_backend()).await;
    let bridge = spawn_bridge(backend).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/api/echo", bridge))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("username=meera&password=s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "username=meera&password=s3cret");
}

#[tokio::test]
async fn unreachable_backend_yields_structured_502_and_bridge_survives() {
    // Grab a port nobody is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let bridge = spawn_bridge(dead).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("http://{}/api/sales/", bridge)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.get("type").and_then(|t| t.as_str()), Some("upstream"));
    assert_eq!(body.get("code").and_then(|c| c.as_str()), Some("upstream_unreachable"));
    assert!(body.get("message").and_then(|m| m.as_str()).is_some());

    // The bridge keeps serving after the failure.
    let resp = client.get(format!("http://{}/api/sales/", bridge)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let resp = client.get(format!("http://{}/", bridge)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "gemgate ok");
}

#[tokio::test]
async fn query_strings_are_forwarded() {
    let backend_router = Router::new().route(
        "/sales/",
        get(|uri: axum::http::Uri| async move {
            (StatusCode::OK, uri.query().unwrap_or("").to_string())
        }),
    );
    let backend = serve(backend_router).await;
    let bridge = spawn_bridge(backend).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/api/sales/?from=2024-01-01&to=2024-02-01", bridge))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "from=2024-01-01&to=2024-02-01");
}
