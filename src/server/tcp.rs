//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Servidor TCP que maneja múltiples conexiones simultáneas usando threads.
//! Cada conexión se procesa en su propio thread y lleva un único request:
//!
//! ```text
//! accept → read_message → parse → auth → router → response → close
//! ```
//!
//! El estado compartido (dispatcher, router, validador de tokens) vive en
//! `Arc` y se clona hacia cada thread.

use crate::auth::TokenValidator;
use crate::config::Config;
use crate::http::{read_message, Request, Response, StatusCode};
use crate::jobs::Dispatcher;
use crate::router::Router;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Estado compartido por todos los threads de conexión
struct Shared {
    router: Router,
    dispatcher: Arc<Dispatcher>,
    auth: Option<TokenValidator>,
}

/// Servidor HTTP/1.0 concurrente de la API de despacho
pub struct Server {
    config: Config,
    shared: Arc<Shared>,
}

impl Server {
    pub fn new(config: Config, dispatcher: Arc<Dispatcher>) -> Self {
        let auth = config.secret_key.as_deref().map(TokenValidator::new);
        if auth.is_none() {
            tracing::warn!("no secret key configured, requests are not authenticated");
        }

        Self {
            config,
            shared: Arc::new(Shared {
                router: Router::with_dispatch_routes(),
                dispatcher,
                auth,
            }),
        }
    }

    /// Hace bind en la dirección configurada y atiende conexiones
    pub fn run(&self) -> std::io::Result<()> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address)?;
        tracing::info!(%address, "server listening");
        self.serve(listener)
    }

    /// Atiende conexiones de un listener ya creado (un thread por conexión)
    pub fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let shared = Arc::clone(&self.shared);
                    let spawned = thread::Builder::new()
                        .name("conn".to_string())
                        .spawn(move || {
                            if let Err(e) = handle_connection(stream, &shared) {
                                tracing::warn!(error = %e, "connection error");
                            }
                        });
                    if let Err(e) = spawned {
                        tracing::error!(error = %e, "failed to spawn connection thread");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                }
            }
        }

        Ok(())
    }
}

fn handle_connection(mut stream: TcpStream, shared: &Shared) -> std::io::Result<()> {
    let start = Instant::now();
    let request_id = format!("{:016x}", NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed));

    let raw = match read_message(&mut stream) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            tracing::warn!(request_id = %request_id, error = %e, "rejecting request");
            let response = Response::error(StatusCode::BadRequest, "Request too large");
            stream.write_all(&response.to_bytes())?;
            return stream.flush();
        }
        Err(e) => return Err(e),
    };

    if raw.is_empty() {
        tracing::debug!(request_id = %request_id, "connection closed without data");
        return Ok(());
    }

    let (mut response, path) = match Request::parse(&raw) {
        Ok(request) => {
            let path = request.path().to_string();
            tracing::debug!(
                request_id = %request_id,
                method = request.method().as_str(),
                path = %path,
                "request received"
            );
            (handle_request(&request, shared), path)
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "parse error");
            (
                Response::error(StatusCode::BadRequest, &format!("Invalid request: {}", e)),
                String::from("-"),
            )
        }
    };

    response.add_header("X-Request-Id", &request_id);
    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    tracing::info!(
        request_id = %request_id,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "request handled"
    );

    Ok(())
}

fn handle_request(request: &Request, shared: &Shared) -> Response {
    if let Some(validator) = &shared.auth {
        if let Err(e) = validator.validate_header(request.header("authorization")) {
            tracing::warn!(error = %e, "authentication failed");
            return Response::error(StatusCode::Forbidden, &e.to_string());
        }
    }

    shared.router.route(request, &shared.dispatcher)
}
