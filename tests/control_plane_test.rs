use hyper::{Body, Client, Method, Request, StatusCode};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dns_control::{
    BearerAuth, ControlApi, ControlError, ControlServer, MemoryRegistry, ServerState,
    ServerTimeouts, ZoneFiles, ZoneRegistry,
};

/// End-to-end tests for the zone control API over a real listener

const TOKEN: &str = "secret";

struct TestServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), ControlError>>,
}

impl TestServer {
    async fn start(registry: Arc<MemoryRegistry>, zones_dir: &Path) -> Self {
        let api = ControlApi::new(registry, ZoneFiles::new(zones_dir), BearerAuth::new(TOKEN));
        let server = Arc::new(ControlServer::new(Arc::new(api), ServerTimeouts::default()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();

        let mut states = server.subscribe();
        let handle = {
            let cancel = cancel.clone();
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(listener, cancel).await })
        };
        states
            .wait_for(|s| *s == ServerState::Running)
            .await
            .unwrap();

        Self {
            addr,
            cancel,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.cancel.cancel();
        let result = self.handle.await.unwrap();
        assert!(result.is_ok());
    }
}

async fn send(
    method: Method,
    url: String,
    token: Option<&str>,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let client = Client::new();

    let mut builder = Request::builder().method(method).uri(url);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();

    let response = client.request(req).await.unwrap();
    let status = response.status();
    let body_bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_missing_authorization_header() {
    let temp_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(Arc::new(MemoryRegistry::new()), temp_dir.path()).await;

    let (status, json) = send(Method::GET, server.url("/zone"), None, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json,
        serde_json::json!({ "success": false, "error": "Authorization header is missing" })
    );

    server.stop().await;
}

#[tokio::test]
async fn test_get_missing_zone() {
    let temp_dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(Arc::new(MemoryRegistry::new()), temp_dir.path()).await;

    let (status, json) = send(
        Method::GET,
        server.url("/zone/example.com"),
        Some(TOKEN),
        "",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json,
        serde_json::json!({ "success": false, "error": "Zone not found" })
    );

    server.stop().await;
}

#[tokio::test]
async fn test_create_zone_is_durable_and_visible() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let server = TestServer::start(registry.clone(), temp_dir.path()).await;

    let (status, json) = send(
        Method::POST,
        server.url("/zone/example.com"),
        Some(TOKEN),
        r#"{"records":[]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({ "success": true, "result": "Zone created successfully" })
    );

    let on_disk = std::fs::read_to_string(temp_dir.path().join("example.com.json")).unwrap();
    assert_eq!(on_disk, r#"{"records":[]}"#);

    let (status, json) = send(
        Method::GET,
        server.url("/zone/example.com"),
        Some(TOKEN),
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["result"]["document"], serde_json::json!({ "records": [] }));

    let (status, json) = send(Method::GET, server.url("/zone"), Some(TOKEN), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({ "success": true, "result": ["example.com"] })
    );

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_body_changes_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let server = TestServer::start(registry.clone(), temp_dir.path()).await;

    for body in ["[]", "{not json"] {
        let (status, json) = send(
            Method::POST,
            server.url("/zone/example.com"),
            Some(TOKEN),
            body,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }

    assert!(registry.get("example.com").await.is_none());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_restart_restores_zones() {
    let temp_dir = tempfile::tempdir().unwrap();

    let server = TestServer::start(Arc::new(MemoryRegistry::new()), temp_dir.path()).await;
    let (status, _) = send(
        Method::POST,
        server.url("/zone/example.org"),
        Some(TOKEN),
        r#"{"serial":42,"data":{"www":{"a":[["192.0.2.7",1]]}}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    server.stop().await;

    let registry = Arc::new(MemoryRegistry::new());
    let restored = ZoneFiles::new(temp_dir.path())
        .restore_to(registry.as_ref())
        .await
        .unwrap();
    assert_eq!(restored, 1);

    let server = TestServer::start(registry, temp_dir.path()).await;
    let (status, json) = send(
        Method::GET,
        server.url("/zone/example.org"),
        Some(TOKEN),
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["serial"], 42);
    assert!(json["result"]["labels"]["www"].is_object());

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_writes_same_zone() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let server = TestServer::start(registry.clone(), temp_dir.path()).await;

    let mut handles = Vec::new();
    for serial in 1..=8u32 {
        let url = server.url("/zone/race.example");
        handles.push(tokio::spawn(async move {
            let body = format!(r#"{{"serial":{},"ttl":{}}}"#, serial, serial);
            send(Method::POST, url, Some(TOKEN), &body).await.0
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let zone = registry.get("race.example").await.unwrap();
    assert_eq!(zone.serial, zone.ttl);

    server.stop().await;
}
