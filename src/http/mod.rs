//! # Módulo HTTP
//!
//! Implementación mínima de HTTP/1.0 sobre la que se montan la API de
//! despacho y el balanceador:
//!
//! - Parsing de requests (request line, headers, body JSON)
//! - Lectura de un mensaje completo desde el socket (`Content-Length`)
//! - Construcción de responses
//! - Códigos de estado
//!
//! Cada conexión lleva un único request; la respuesta se envía y se cierra
//! la conexión, como en HTTP/1.0.

pub mod request;
pub mod response;
pub mod status;

pub use request::{read_message, Method, Request};
pub use response::Response;
pub use status::StatusCode;
