//! # Worker de Ejemplo
//! demos/worker.rs
//!
//! Worker que consulta el servidor de despacho en bucle: toma el siguiente
//! job con `GET /fetch-requests`, simula el procesamiento y reporta
//! `Processed query: <query>` con `POST /submit-result`. Cuando no hay jobs
//! espera `--backoff-secs` antes de volver a consultar.
//!
//! ```text
//! cargo run --example worker -- --server 127.0.0.1:5000 --secret-key s3cret
//! ```

use clap::Parser;
use dispatch_server::auth;
use dispatch_server::logging;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "Worker que procesa jobs del servidor de despacho")]
struct Args {
    /// Dirección del servidor (o del balanceador)
    #[arg(long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Token bearer ya emitido
    #[arg(long, env = "WORKER_TOKEN")]
    token: Option<String>,

    /// Clave para emitir un token propio si no se pasa --token
    #[arg(long, env = "SECRET_KEY")]
    secret_key: Option<String>,

    /// Espera cuando la cola está vacía o el servidor falla
    #[arg(long, default_value_t = 10)]
    backoff_secs: u64,

    /// Tiempo simulado de procesamiento por job
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Nivel de logging
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Envía un request HTTP/1.0 y retorna (status, body JSON)
fn send(
    server: &str,
    method: &str,
    path: &str,
    body: Option<&Value>,
    token: Option<&str>,
) -> std::io::Result<(u16, Value)> {
    let mut stream = TcpStream::connect(server)?;

    let body = body.map(Value::to_string).unwrap_or_default();
    let mut request = format!("{} {} HTTP/1.0\r\n", method, path);
    if let Some(token) = token {
        request.push_str(&format!("Authorization: Bearer {}\r\n", token));
    }
    request.push_str("Content-Type: application/json\r\n");
    request.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    stream.write_all(request.as_bytes())?;
    stream.flush()?;

    // El servidor cierra la conexión al terminar la respuesta
    let mut response = String::new();
    stream.read_to_string(&mut response)?;

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let body = response
        .split_once("\r\n\r\n")
        .and_then(|(_, body)| serde_json::from_str(body).ok())
        .unwrap_or(Value::Null);

    Ok((status, body))
}

/// Toma el siguiente job; `None` si no hay o si el servidor respondió error
fn fetch_job(args: &Args, token: Option<&str>) -> std::io::Result<Option<(u64, String)>> {
    let (status, body) = send(&args.server, "GET", "/fetch-requests", None, token)?;
    if status != 200 {
        tracing::warn!(status, body = %body, "error fetching request");
        return Ok(None);
    }

    let id = body["request_id"].as_u64();
    let query = body["query"].as_str();
    Ok(id.zip(query).map(|(id, query)| (id, query.to_string())))
}

fn submit_result(args: &Args, token: Option<&str>, id: u64, result: &str) -> std::io::Result<()> {
    let payload = json!({"request_id": id, "result": result});
    let (status, body) = send(&args.server, "POST", "/submit-result", Some(&payload), token)?;

    if status == 200 {
        tracing::info!(id, "result submitted");
    } else {
        tracing::warn!(id, status, body = %body, "error submitting result");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let token = match (&args.token, &args.secret_key) {
        (Some(token), _) => Some(token.clone()),
        (None, Some(secret)) => Some(auth::issue_token(secret, "worker")?),
        (None, None) => None,
    };

    let backoff = Duration::from_secs(args.backoff_secs);
    let delay = Duration::from_millis(args.delay_ms);
    tracing::info!(server = %args.server, "worker started");

    loop {
        match fetch_job(&args, token.as_deref()) {
            Ok(Some((id, query))) => {
                tracing::info!(id, query = %query, "processing request");
                thread::sleep(delay);

                let result = format!("Processed query: {}", query);
                if let Err(e) = submit_result(&args, token.as_deref(), id, &result) {
                    tracing::warn!(id, error = %e, "server unreachable, result lost");
                }
            }
            Ok(None) => {
                tracing::info!("no requests to process, waiting");
                thread::sleep(backoff);
            }
            Err(e) => {
                tracing::warn!(error = %e, "server unreachable, waiting");
                thread::sleep(backoff);
            }
        }
    }
}
