//! # Balancer - Entry Point
//! src/bin/balancer.rs
//!
//! Proxy round-robin delante de varias instancias de `dispatch_server`.

use clap::Parser;
use dispatch_server::config::BalancerConfig;
use dispatch_server::logging;
use dispatch_server::proxy::Balancer;
use std::net::TcpListener;

fn main() {
    let config = BalancerConfig::parse();
    logging::init(&config.log_level);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    let balancer = match Balancer::from_config(&config) {
        Ok(balancer) => balancer,
        Err(e) => {
            tracing::error!(error = %e, "cannot start balancer");
            std::process::exit(1);
        }
    };

    let address = config.address();
    let listener = match TcpListener::bind(&address) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%address, error = %e, "bind failed");
            std::process::exit(1);
        }
    };

    tracing::info!(
        %address,
        upstreams = ?balancer.upstreams().upstreams(),
        "balancer listening"
    );

    if let Err(e) = balancer.serve(listener) {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}
