//! # Tipos y Estructuras para el Sistema de Jobs
//! src/jobs/types.rs
//!
//! Define los tipos fundamentales del motor de despacho: el identificador
//! de un job, su estado y el registro completo tal como vive en el store.

use serde::{Deserialize, Serialize};

/// Identificador de un job.
///
/// Lo asigna el store, crece monotónicamente desde 1 y nunca se reutiliza.
pub type JobId = u64;

/// Estado de un job
///
/// No existe un estado intermedio de "despachado": un job que un worker ya
/// recibió sigue en `Pending` hasta que alguien reporta su resultado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job creado, esperando resultado
    Pending,

    /// Job con resultado reportado
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fila de la tabla `requests`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// ID asignado por el store
    pub id: JobId,

    /// Texto de entrada (inmutable)
    #[serde(rename = "request_text")]
    pub text: String,

    /// Estado actual
    pub status: JobStatus,

    /// Resultado reportado por el worker (si ya existe)
    pub result: Option<String>,
}

impl JobRecord {
    /// Crea un registro nuevo en estado `Pending`
    pub fn new(id: JobId, text: String) -> Self {
        Self {
            id,
            text,
            status: JobStatus::Pending,
            result: None,
        }
    }

    /// Marca el job como completado.
    ///
    /// Sobrescribe cualquier resultado previo (last write wins).
    pub fn mark_completed(&mut self, result: String) {
        self.status = JobStatus::Completed;
        self.result = Some(result);
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }
}
