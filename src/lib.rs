//! # Dispatch Server
//! src/lib.rs
//!
//! Servicio de despacho de trabajos de un solo nodo. Los productores envían
//! consultas, los workers las piden una a una y devuelven resultados, y los
//! clientes consultan el estado de cada trabajo. La cola pendiente sobrevive
//! reinicios gracias a un snapshot que se reescribe en cada mutación.
//!
//! ## Arquitectura
//!
//! - `http`: Parsing y construcción de mensajes HTTP/1.0
//! - `server`: Servidor TCP, un thread por conexión
//! - `router`: Enrutamiento de peticiones a handlers
//! - `auth`: Bearer tokens HS256
//! - `jobs`: Store, pool de conexiones, cola pendiente, recuperación
//! - `proxy`: Balanceador round-robin
//! - `config`, `logging`, `error`: configuración, trazas y errores
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use dispatch_server::config::Config;
//! use dispatch_server::jobs::{Dispatcher, DispatcherConfig};
//! use dispatch_server::server::Server;
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let dispatcher = Dispatcher::open(&DispatcherConfig::from_config(&config)).unwrap();
//! let server = Server::new(config, Arc::new(dispatcher));
//! server.run().unwrap();
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod logging;
pub mod proxy;
pub mod router;
pub mod server;
