//! # Dispatch Server - Entry Point
//! src/main.rs
//!
//! Arranca el servidor de despacho: parsea la configuración, recupera la
//! cola pendiente desde disco y atiende requests hasta que el proceso muere.
//!
//! Con `--issue-token <sujeto>` solo imprime un token firmado y termina.

use dispatch_server::auth;
use dispatch_server::config::Config;
use dispatch_server::jobs::{Dispatcher, DispatcherConfig};
use dispatch_server::logging;
use dispatch_server::server::Server;
use std::sync::Arc;

fn main() {
    let config = Config::new();
    logging::init(&config.log_level);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    if let (Some(subject), Some(secret)) = (&config.issue_token, &config.secret_key) {
        match auth::issue_token(secret, subject) {
            Ok(token) => {
                println!("{}", token);
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot issue token");
                std::process::exit(1);
            }
        }
    }

    config.log_summary();

    let dispatcher = match Dispatcher::open(&DispatcherConfig::from_config(&config)) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::error!(error = %e, "cannot open job store");
            std::process::exit(1);
        }
    };

    let server = Server::new(config, Arc::new(dispatcher));
    if let Err(e) = server.run() {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}
