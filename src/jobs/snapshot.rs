//! # Snapshot de la Cola Pendiente
//! src/jobs/snapshot.rs
//!
//! Serialización versionada y explícita del contenido de la cola:
//!
//! ```json
//! {"version": 1, "high_water": 7, "pending": [5, 6, 7]}
//! ```
//!
//! `pending` es la cola en orden FIFO. `high_water` es el ID más alto que
//! alguna vez entró a la cola; la recuperación lo usa para distinguir un job
//! ya despachado de uno que quedó huérfano por un crash durante el submit.

use crate::error::{DispatchError, DispatchResult};
use crate::jobs::durable::{ensure_parent_dir, write_json_atomic};
use crate::jobs::types::JobId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Versión actual del formato del snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

/// Contenido persistido de la cola
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub high_water: JobId,
    pub pending: Vec<JobId>,
}

impl Snapshot {
    pub fn new(high_water: JobId, pending: Vec<JobId>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            high_water,
            pending,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }
}

/// Archivo donde vive el snapshot
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lee el último snapshot.
    ///
    /// Retorna `None` si el archivo no existe o está vacío. Un contenido
    /// ilegible o de otra versión es un error.
    pub fn load(&self) -> DispatchResult<Option<Snapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let invalid = |reason: String| DispatchError::Snapshot {
            path: self.path.display().to_string(),
            reason,
        };

        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(invalid(format!("unsupported version {}", snapshot.version)));
        }

        Ok(Some(snapshot))
    }

    /// Reemplaza el snapshot en disco (fsync + rename atómico)
    pub fn write(&self, snapshot: &Snapshot) -> DispatchResult<()> {
        write_json_atomic(&self.path, snapshot)
    }

    /// Crea el directorio del snapshot si falta
    pub fn prepare(&self) -> DispatchResult<()> {
        ensure_parent_dir(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("queue.json"));
        assert_eq!(file.load().unwrap(), None);
    }

    #[test]
    fn test_empty_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, b"  \n").unwrap();

        assert_eq!(SnapshotFile::new(&path).load().unwrap(), None);
    }

    #[test]
    fn test_write_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("queue.json"));

        let snapshot = Snapshot::new(9, vec![9, 3, 7]);
        file.write(&snapshot).unwrap();

        assert_eq!(file.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_format_is_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        SnapshotFile::new(&path).write(&Snapshot::new(2, vec![1, 2])).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"version": 1, "high_water": 2, "pending": [1, 2]}));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, br#"{"version": 99, "high_water": 0, "pending": []}"#).unwrap();

        assert!(matches!(
            SnapshotFile::new(&path).load(),
            Err(DispatchError::Snapshot { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, b"\x80\x03cqueue\nQueue").unwrap();

        assert!(SnapshotFile::new(&path).load().is_err());
    }
}
