//! # Logging
//! src/logging.rs
//!
//! Inicializa `tracing-subscriber` una sola vez por proceso. `RUST_LOG`
//! tiene prioridad sobre el nivel configurado.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Instala el subscriber global
///
/// Llamadas repetidas (por ejemplo desde varios tests) se ignoran.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_names(true))
        .try_init();
}
