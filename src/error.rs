//! # Errores del Motor de Despacho
//! src/error.rs
//!
//! Taxonomía de errores que cruzan la frontera entre el núcleo (store,
//! pool, cola) y la capa HTTP. Cada variante sabe qué código HTTP le toca.

use crate::http::StatusCode;
use crate::jobs::types::JobId;
use thiserror::Error;

/// Errores del motor de despacho
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Falta un campo requerido o viene vacío
    #[error("{0}")]
    Validation(String),

    /// ID de job desconocido para el store
    #[error("Request not found: {0}")]
    NotFound(JobId),

    /// Ninguna conexión quedó libre dentro del timeout configurado
    #[error("No store connection available after {waited_ms} ms")]
    PoolTimeout { waited_ms: u64 },

    /// Fallo de E/S al leer o escribir la tabla o el snapshot
    #[error("Storage unavailable: {0}")]
    Storage(#[from] std::io::Error),

    /// Fallo al serializar o deserializar JSON persistido
    #[error("Storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// El archivo de la tabla existe pero no se puede interpretar
    #[error("Corrupt job table {path}: {reason}")]
    CorruptTable { path: String, reason: String },

    /// El snapshot de la cola existe pero no se puede interpretar
    #[error("Invalid queue snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Código HTTP con el que se reporta este error al cliente
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Validation(_) => StatusCode::BadRequest,
            DispatchError::NotFound(_) => StatusCode::NotFound,
            DispatchError::PoolTimeout { .. } => StatusCode::ServiceUnavailable,
            DispatchError::Storage(_)
            | DispatchError::Encoding(_)
            | DispatchError::CorruptTable { .. }
            | DispatchError::Snapshot { .. } => StatusCode::InternalServerError,
        }
    }

    /// Mensaje que ve el cliente.
    ///
    /// Los errores de almacenamiento no exponen rutas ni detalles internos.
    pub fn client_message(&self) -> String {
        match self {
            DispatchError::Validation(_)
            | DispatchError::NotFound(_)
            | DispatchError::PoolTimeout { .. } => self.to_string(),
            _ => "Storage unavailable".to_string(),
        }
    }
}
