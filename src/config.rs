//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor de despacho y del balanceador, con soporte
//! para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./dispatch_server --port 8080 \
//!   --db-path ./data/requests.json \
//!   --pool-size 5 \
//!   --secret-key s3cret
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 SECRET_KEY=s3cret DB_POOL_SIZE=8 ./dispatch_server
//! ```
//!
//! ### Emitir un token
//! ```bash
//! SECRET_KEY=s3cret ./dispatch_server --issue-token worker-1
//! ```

use clap::Parser;
use std::time::Duration;

/// Configuración del servidor de despacho
#[derive(Debug, Clone, Parser)]
#[command(name = "dispatch_server")]
#[command(about = "Servidor de despacho de trabajos con cola durable")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    // === Persistencia ===

    /// Archivo de la tabla de jobs
    #[arg(long = "db-path", default_value = "./data/requests.json", env = "DB_PATH")]
    pub db_path: String,

    /// Archivo del snapshot de la cola pendiente
    #[arg(
        long = "queue-snapshot",
        default_value = "./data/request_queue.json",
        env = "QUEUE_SNAPSHOT"
    )]
    pub queue_snapshot: String,

    // === Pool ===

    /// Número de conexiones del pool
    #[arg(long = "pool-size", default_value = "5", env = "DB_POOL_SIZE")]
    pub pool_size: usize,

    /// Espera máxima por una conexión en milisegundos (0 = esperar siempre)
    #[arg(long = "acquire-timeout-ms", default_value = "0", env = "ACQUIRE_TIMEOUT_MS")]
    pub acquire_timeout_ms: u64,

    // === Auth ===

    /// Secreto HS256 para los bearer tokens (sin secreto no hay auth)
    #[arg(long = "secret-key", env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Emite un token para este sujeto y termina
    #[arg(long = "issue-token", value_name = "SUBJECT")]
    pub issue_token: Option<String>,

    // === Logging ===

    /// Nivel de log por defecto (RUST_LOG tiene prioridad)
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use dispatch_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout de adquisición del pool; `None` si se espera indefinidamente
    pub fn acquire_timeout(&self) -> Option<Duration> {
        match self.acquire_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }
        if self.pool_size == 0 {
            return Err("Pool size must be >= 1".to_string());
        }
        if self.db_path.is_empty() || self.queue_snapshot.is_empty() {
            return Err("Storage paths must not be empty".to_string());
        }
        if self.db_path == self.queue_snapshot {
            return Err("Database and queue snapshot paths must differ".to_string());
        }
        if matches!(&self.secret_key, Some(s) if s.is_empty()) {
            return Err("Secret key must not be empty".to_string());
        }
        if self.issue_token.is_some() && self.secret_key.is_none() {
            return Err("Issuing a token requires --secret-key".to_string());
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        tracing::info!(
            address = %self.address(),
            db_path = %self.db_path,
            queue_snapshot = %self.queue_snapshot,
            pool_size = self.pool_size,
            acquire_timeout_ms = self.acquire_timeout_ms,
            auth = self.secret_key.is_some(),
            "dispatch server configuration"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            db_path: "./data/requests.json".to_string(),
            queue_snapshot: "./data/request_queue.json".to_string(),
            pool_size: 5,
            acquire_timeout_ms: 0,
            secret_key: None,
            issue_token: None,
            log_level: "info".to_string(),
        }
    }
}

/// Configuración del balanceador round-robin
#[derive(Debug, Clone, Parser)]
#[command(name = "balancer")]
#[command(about = "Balanceador round-robin para servidores de despacho")]
#[command(version = "0.1.0")]
pub struct BalancerConfig {
    /// Puerto en el que escucha el balanceador
    #[arg(short, long, default_value = "5020", env = "BALANCER_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "BALANCER_HOST")]
    pub host: String,

    /// Servidores upstream (host:port), separados por coma
    #[arg(
        long = "upstream",
        env = "BALANCER_UPSTREAMS",
        value_delimiter = ',',
        default_value = "127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002"
    )]
    pub upstreams: Vec<String>,

    /// Timeout de conexión y lectura hacia un upstream en milisegundos
    #[arg(long = "upstream-timeout-ms", default_value = "30000", env = "UPSTREAM_TIMEOUT_MS")]
    pub upstream_timeout_ms: u64,

    /// Nivel de log por defecto (RUST_LOG tiene prioridad)
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl BalancerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.upstreams.iter().all(|u| u.trim().is_empty()) {
            return Err("At least one upstream is required".to_string());
        }
        if self.upstream_timeout_ms == 0 {
            return Err("Upstream timeout must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            port: 5020,
            host: "127.0.0.1".to_string(),
            upstreams: vec![
                "127.0.0.1:5000".to_string(),
                "127.0.0.1:5001".to_string(),
                "127.0.0.1:5002".to_string(),
            ],
            upstream_timeout_ms: 30_000,
            log_level: "info".to_string(),
        }
    }
}
