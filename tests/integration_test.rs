//! Tests de integración para el servidor de despacho
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero, con el store
//! y el snapshot en un directorio temporal.

use dispatch_server::auth::{issue_token, issue_token_at, TOKEN_TTL_SECS};
use dispatch_server::config::Config;
use dispatch_server::jobs::{Dispatcher, DispatcherConfig};
use dispatch_server::server::Server;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SECRET: &str = "integration-secret";

/// Helper: levanta un servidor en background y retorna su dirección
fn start_server(dir: &Path, secret: Option<&str>, pool_size: usize) -> SocketAddr {
    let mut dispatcher_config = DispatcherConfig::in_dir(dir);
    dispatcher_config.pool_size = pool_size;
    let dispatcher = Arc::new(Dispatcher::open(&dispatcher_config).expect("open dispatcher"));

    let mut config = Config::default();
    config.secret_key = secret.map(str::to_string);
    let server = Server::new(config, dispatcher);

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || server.serve(listener));
    addr
}

/// Helper: envía un request HTTP y retorna (status, body JSON)
fn send(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&Value>,
    token: Option<&str>,
) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let body = body.map(|b| b.to_string()).unwrap_or_default();
    let mut request = format!("{} {} HTTP/1.0\r\n", method, path);
    if let Some(token) = token {
        request.push_str(&format!("Authorization: Bearer {}\r\n", token));
    }
    request.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));

    stream.write_all(request.as_bytes()).unwrap();
    stream.flush().unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let body = response
        .split_once("\r\n\r\n")
        .and_then(|(_, body)| serde_json::from_str(body).ok())
        .unwrap_or(Value::Null);

    (status, body)
}

fn submit(addr: SocketAddr, query: &str, token: Option<&str>) -> u64 {
    let (status, body) = send(addr, "POST", "/submit-request", Some(&json!({"query": query})), token);
    assert_eq!(status, 200, "submit failed: {}", body);
    body["request_id"].as_u64().expect("request_id")
}

// ==================== Flujo completo ====================

#[test]
fn test_end_to_end_flow() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path(), None, 5);

    let (status, body) = send(addr, "POST", "/submit-request", Some(&json!({"query": "hello"})), None);
    assert_eq!(status, 200);
    assert_eq!(body, json!({"message": "Request submitted", "request_id": 1}));

    let (status, body) = send(addr, "GET", "/fetch-requests", None, None);
    assert_eq!(status, 200);
    assert_eq!(body, json!({"request_id": 1, "query": "hello"}));

    // Ya entregado: no se vuelve a entregar
    let (_, body) = send(addr, "GET", "/fetch-requests", None, None);
    assert_eq!(body, json!({"message": "No pending requests"}));

    let (_, body) = send(addr, "GET", "/get-result/1", None, None);
    assert_eq!(body, json!({"status": "pending", "result": null}));

    let (status, body) = send(
        addr,
        "POST",
        "/submit-result",
        Some(&json!({"request_id": 1, "result": "Processed query: hello"})),
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(body, json!({"message": "Result submitted"}));

    let (status, body) = send(addr, "GET", "/get-result/1", None, None);
    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"status": "completed", "result": "Processed query: hello"})
    );
}

#[test]
fn test_fifo_order() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path(), None, 5);

    for query in ["a", "b", "c"] {
        submit(addr, query, None);
    }

    let fetched: Vec<Value> = (0..3)
        .map(|_| send(addr, "GET", "/fetch-requests", None, None).1["query"].clone())
        .collect();
    assert_eq!(fetched, vec![json!("a"), json!("b"), json!("c")]);
}

// ==================== Validación ====================

#[test]
fn test_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path(), None, 5);

    let (status, body) = send(addr, "POST", "/submit-request", Some(&json!({})), None);
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid request, no query provided");

    let (status, body) = send(addr, "POST", "/submit-result", Some(&json!({"result": "x"})), None);
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid request, missing request_id or result");

    let (status, body) = send(addr, "GET", "/get-result/42", None, None);
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Request not found");

    let (status, _) = send(addr, "GET", "/nope", None, None);
    assert_eq!(status, 404);

    let (status, _) = send(addr, "POST", "/fetch-requests", None, None);
    assert_eq!(status, 405);
}

#[test]
fn test_stats_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path(), None, 3);

    submit(addr, "a", None);
    submit(addr, "b", None);
    send(addr, "GET", "/fetch-requests", None, None);

    let (status, body) = send(addr, "GET", "/stats", None, None);
    assert_eq!(status, 200);
    assert_eq!(body["queue_depth"], 1);
    assert_eq!(body["high_water"], 2);
    assert_eq!(body["pool_size"], 3);
    assert_eq!(body["jobs_total"], 2);
}

// ==================== Auth ====================

#[test]
fn test_auth_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path(), Some(SECRET), 5);

    let (status, body) = send(addr, "GET", "/fetch-requests", None, None);
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Unauthorized, token missing");

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let expired = issue_token_at(SECRET, "worker", now - 2 * TOKEN_TTL_SECS).unwrap();
    let (status, body) = send(addr, "GET", "/fetch-requests", None, Some(&expired));
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Token expired");

    let forged = issue_token("wrong-secret", "worker").unwrap();
    let (status, body) = send(addr, "GET", "/fetch-requests", None, Some(&forged));
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Invalid token");

    // Nada de lo anterior llegó al store
    let token = issue_token(SECRET, "worker").unwrap();
    let id = submit(addr, "hello", Some(&token));
    assert_eq!(id, 1);
}

// ==================== Concurrencia ====================

#[test]
fn test_concurrent_submits_get_unique_ids() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(dir.path(), None, 2);

    let handles: Vec<_> = (0..16)
        .map(|i| thread::spawn(move || submit(addr, &format!("job-{}", i), None)))
        .collect();
    let ids: HashSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids, (1..=16).collect::<HashSet<u64>>());

    // Cada job se entrega exactamente una vez entre workers concurrentes
    let workers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                let mut got = Vec::new();
                loop {
                    let (_, body) = send(addr, "GET", "/fetch-requests", None, None);
                    match body["request_id"].as_u64() {
                        Some(id) => got.push(id),
                        None => break got,
                    }
                }
            })
        })
        .collect();

    let mut delivered: Vec<u64> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    delivered.sort_unstable();
    assert_eq!(delivered, (1..=16).collect::<Vec<u64>>());
}
