//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP de la API de despacho:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes (un thread por conexión)
//! 3. Lee, autentica y enruta requests HTTP
//! 4. Envía la respuesta y cierra la conexión

pub mod tcp;

pub use tcp::Server;
