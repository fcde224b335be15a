//! # Balanceador Round-Robin
//! src/proxy/mod.rs
//!
//! Reenvía cada request entrante, byte a byte, al siguiente servidor de una
//! lista fija y devuelve la respuesta sin modificarla. Si el upstream elegido
//! no responde se contesta 502; no hay reintentos ni health checks.
//!
//! ```text
//! cliente → balancer → upstream[i % n] → balancer → cliente
//! ```

use crate::config::BalancerConfig;
use crate::http::{read_message, Response, StatusCode};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no upstream servers configured")]
    NoUpstreams,

    #[error("upstream {addr} failed: {source}")]
    Upstream {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Normaliza una dirección de upstream a `host:port`
///
/// ```
/// use dispatch_server::proxy::normalize_upstream;
///
/// assert_eq!(normalize_upstream("http://10.0.0.1:5000/"), "10.0.0.1:5000");
/// assert_eq!(normalize_upstream(" 10.0.0.2:5000 "), "10.0.0.2:5000");
/// ```
pub fn normalize_upstream(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed.strip_prefix("http://").unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

/// Selección round-robin sobre una lista fija de upstreams
#[derive(Debug)]
pub struct RoundRobin {
    upstreams: Vec<String>,
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new<I, S>(upstreams: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let upstreams: Vec<String> = upstreams
            .into_iter()
            .map(|u| normalize_upstream(u.as_ref()))
            .filter(|u| !u.is_empty())
            .collect();

        if upstreams.is_empty() {
            return Err(ProxyError::NoUpstreams);
        }

        Ok(Self {
            upstreams,
            next: AtomicUsize::new(0),
        })
    }

    /// Siguiente upstream; empieza por el primero de la lista
    pub fn next_upstream(&self) -> &str {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.upstreams.len();
        &self.upstreams[i]
    }

    pub fn upstreams(&self) -> &[String] {
        &self.upstreams
    }
}

/// Proxy HTTP que reparte requests entre upstreams
pub struct Balancer {
    upstreams: RoundRobin,
    timeout: Duration,
}

impl Balancer {
    pub fn new(upstreams: RoundRobin, timeout: Duration) -> Self {
        Self { upstreams, timeout }
    }

    pub fn from_config(config: &BalancerConfig) -> Result<Self, ProxyError> {
        let upstreams = RoundRobin::new(&config.upstreams)?;
        Ok(Self::new(upstreams, config.upstream_timeout()))
    }

    pub fn upstreams(&self) -> &RoundRobin {
        &self.upstreams
    }

    /// Atiende conexiones (un thread por conexión) hasta que el listener falle
    pub fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let balancer = Arc::new(self);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let balancer = Arc::clone(&balancer);
                    thread::spawn(move || {
                        if let Err(e) = balancer.handle_connection(stream) {
                            tracing::warn!(error = %e, "client connection error");
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
            }
        }

        Ok(())
    }

    fn handle_connection(&self, mut client: TcpStream) -> std::io::Result<()> {
        let raw = match read_message(&mut client) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                let response = Response::error(StatusCode::BadRequest, "Request too large");
                client.write_all(&response.to_bytes())?;
                return client.flush();
            }
            Err(e) => return Err(e),
        };
        if raw.is_empty() {
            return Ok(());
        }

        let reply = match self.forward(&raw) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "upstream request failed");
                Response::error(StatusCode::BadGateway, "Upstream unavailable").to_bytes()
            }
        };

        client.write_all(&reply)?;
        client.flush()
    }

    /// Reenvía un request crudo al siguiente upstream y devuelve su respuesta
    pub fn forward(&self, raw: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let addr = self.upstreams.next_upstream();
        tracing::debug!(upstream = addr, bytes = raw.len(), "forwarding request");

        let upstream_err = |source: std::io::Error| ProxyError::Upstream {
            addr: addr.to_string(),
            source,
        };

        let socket = resolve(addr).map_err(upstream_err)?;
        let mut stream = TcpStream::connect_timeout(&socket, self.timeout).map_err(upstream_err)?;
        stream.set_read_timeout(Some(self.timeout)).map_err(upstream_err)?;
        stream.set_write_timeout(Some(self.timeout)).map_err(upstream_err)?;

        stream.write_all(raw).map_err(upstream_err)?;
        stream.flush().map_err(upstream_err)?;
        // Algunos upstreams esperan EOF si falta Content-Length
        let _ = stream.shutdown(Shutdown::Write);

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).map_err(upstream_err)?;
        if reply.is_empty() {
            return Err(upstream_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "empty response",
            )));
        }

        Ok(reply)
    }
}

fn resolve(addr: &str) -> std::io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("cannot resolve {}", addr),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upstream falso que responde siempre con su nombre
    fn fake_upstream(name: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = stream.unwrap();
                let _ = read_message(&mut stream).unwrap();
                let body = format!("{{\"server\":\"{}\"}}", name);
                let reply = format!(
                    "HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });
        addr
    }

    fn dead_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
        // listener se cierra al salir
    }

    #[test]
    fn test_round_robin_order() {
        let rr = RoundRobin::new(["a:1", "b:2", "c:3"]).unwrap();
        let picked: Vec<&str> = (0..5).map(|_| rr.next_upstream()).collect();
        assert_eq!(picked, vec!["a:1", "b:2", "c:3", "a:1", "b:2"]);
    }

    #[test]
    fn test_round_robin_normalizes() {
        let rr = RoundRobin::new(["http://a:1/", "", "  "]).unwrap();
        assert_eq!(rr.upstreams(), &["a:1".to_string()]);
    }

    #[test]
    fn test_no_upstreams() {
        let empty: [&str; 0] = [];
        assert!(matches!(RoundRobin::new(empty), Err(ProxyError::NoUpstreams)));
        assert!(matches!(RoundRobin::new([" "]), Err(ProxyError::NoUpstreams)));
    }

    #[test]
    fn test_forward_alternates() {
        let a = fake_upstream("a");
        let b = fake_upstream("b");
        let balancer = Balancer::new(RoundRobin::new([a, b]).unwrap(), Duration::from_secs(5));

        let request = b"GET /fetch-requests HTTP/1.0\r\n\r\n";
        let first = String::from_utf8(balancer.forward(request).unwrap()).unwrap();
        let second = String::from_utf8(balancer.forward(request).unwrap()).unwrap();
        let third = String::from_utf8(balancer.forward(request).unwrap()).unwrap();

        assert!(first.ends_with(r#"{"server":"a"}"#));
        assert!(second.ends_with(r#"{"server":"b"}"#));
        assert!(third.ends_with(r#"{"server":"a"}"#));
    }

    #[test]
    fn test_unreachable_upstream_is_502() {
        let balancer = Balancer::new(
            RoundRobin::new([dead_upstream()]).unwrap(),
            Duration::from_secs(2),
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || balancer.serve(listener));

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET /stats HTTP/1.0\r\n\r\n").unwrap();
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf);

        assert!(text.starts_with("HTTP/1.0 502 Bad Gateway"));
        assert!(text.contains("Upstream unavailable"));
    }
}
