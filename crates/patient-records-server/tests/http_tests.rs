//! End-to-end tests over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use patient_records_core::RecordStore;
use patient_records_server::serve;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, store, async move {
            let _ = rx.await;
        }));
        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    /// Send one request and return (status, headers, body).
    async fn request(&self, method: &str, path: &str, body: Option<&str>) -> (u16, String, String) {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let body = body.unwrap_or("");
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8(raw).unwrap();

        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        let status: u16 = head
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap();
        (status, head.to_ascii_lowercase(), body.to_string())
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_patient_lifecycle_over_http() {
    let server = TestServer::start().await;

    let (status, _, body) = server
        .request(
            "POST",
            "/api/patients",
            Some(r#"{"pid":"P100","name":"Jane Doe","age":34,"gender":"F","disease":"flu","doctor":"Dr. Lee"}"#),
        )
        .await;
    assert_eq!(status, 201);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["hash_index"], 5);

    let (status, _, body) = server.request("GET", "/api/patients/P100", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)["data"]["name"], "Jane Doe");

    let (status, _, body) = server.request("GET", "/api/patients", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)["count"], 1);

    let (status, _, _) = server.request("DELETE", "/api/patients/P100", None).await;
    assert_eq!(status, 200);

    let (status, _, body) = server.request("GET", "/api/patients/P100", None).await;
    assert_eq!(status, 404);
    assert_eq!(json(&body)["success"], false);

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = TestServer::start().await;

    let (status, _, body) = server
        .request("POST", "/api/patients", Some("{not json"))
        .await;
    assert_eq!(status, 400);
    assert_eq!(json(&body)["success"], false);

    let (status, _, body) = server
        .request("POST", "/api/patients", Some(r#"{"pid":"P1"}"#))
        .await;
    assert_eq!(status, 400);
    assert!(json(&body)["error"].as_str().unwrap().contains("name"));

    server.stop().await;
}

#[tokio::test]
async fn test_cors_headers_and_preflight() {
    let server = TestServer::start().await;

    let (status, head, _) = server.request("OPTIONS", "/api/patients", None).await;
    assert_eq!(status, 204);
    assert!(head.contains("access-control-allow-origin: *"));
    assert!(head.contains("access-control-allow-methods"));

    let (status, head, body) = server.request("GET", "/api/health", None).await;
    assert_eq!(status, 200);
    assert!(head.contains("access-control-allow-origin: *"));
    assert_eq!(json(&body)["data"]["database_reachable"], true);

    server.stop().await;
}
