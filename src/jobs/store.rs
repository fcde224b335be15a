//! # Store Durable de Jobs
//! src/jobs/store.rs
//!
//! Tabla `requests(id, request_text, status, result)` persistida en un
//! archivo JSON. Es la única fuente de verdad sobre el contenido, estado y
//! resultado de cada job.
//!
//! El acceso se hace a través de [`Connection`]s que entrega el
//! [`ConnectionPool`](crate::jobs::pool::ConnectionPool). Toda escritura
//! reescribe el archivo completo antes de retornar; si la escritura falla,
//! el cambio en memoria se revierte y la tabla queda como estaba.

use crate::error::{DispatchError, DispatchResult};
use crate::jobs::durable::{ensure_parent_dir, write_json_atomic};
use crate::jobs::types::{JobId, JobRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Versión del formato del archivo de la tabla
pub const TABLE_VERSION: u32 = 1;

/// Nombre de la tabla (se guarda en el archivo para detectar mezclas)
pub const TABLE_NAME: &str = "requests";

/// Formato en disco de la tabla
#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    version: u32,
    table: String,
    next_id: JobId,
    rows: Vec<JobRecord>,
}

/// Estado en memoria de la tabla
#[derive(Debug)]
struct Table {
    /// Próximo ID a asignar
    next_id: JobId,

    /// Filas ordenadas por ID
    rows: BTreeMap<JobId, JobRecord>,
}

impl Table {
    fn empty() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }

    fn to_file(&self) -> TableFile {
        TableFile {
            version: TABLE_VERSION,
            table: TABLE_NAME.to_string(),
            next_id: self.next_id,
            rows: self.rows.values().cloned().collect(),
        }
    }
}

/// Store de jobs respaldado por archivo
#[derive(Clone)]
pub struct JobStore {
    /// Ruta al archivo de la tabla
    path: PathBuf,

    /// Tabla compartida por todas las conexiones
    table: Arc<Mutex<Table>>,
}

impl JobStore {
    /// Abre (o crea) la tabla en `path`
    ///
    /// Un archivo inexistente o vacío produce una tabla vacía que se
    /// persiste de inmediato. Un archivo corrupto es un error: el store es
    /// la fuente de verdad y nunca se reinicia en silencio.
    pub fn open(path: impl AsRef<Path>) -> DispatchResult<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;

        let table = match Self::load_from_file(&path)? {
            Some(table) => table,
            None => {
                let table = Table::empty();
                write_json_atomic(&path, &table.to_file())?;
                tracing::info!(path = %path.display(), "created empty job table");
                table
            }
        };

        tracing::info!(
            path = %path.display(),
            rows = table.rows.len(),
            next_id = table.next_id,
            "job table opened"
        );

        Ok(Self {
            path,
            table: Arc::new(Mutex::new(table)),
        })
    }

    /// Carga la tabla desde el archivo; `None` si no existe o está vacío
    fn load_from_file(path: &Path) -> DispatchResult<Option<Table>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let corrupt = |reason: String| DispatchError::CorruptTable {
            path: path.display().to_string(),
            reason,
        };

        let file: TableFile = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;

        if file.version != TABLE_VERSION {
            return Err(corrupt(format!("unsupported version {}", file.version)));
        }
        if file.table != TABLE_NAME {
            return Err(corrupt(format!("unexpected table '{}'", file.table)));
        }

        let mut rows = BTreeMap::new();
        for row in file.rows {
            if rows.insert(row.id, row).is_some() {
                return Err(corrupt("duplicate row id".to_string()));
            }
        }

        // next_id siempre queda por encima del ID más alto visto
        let max_id = rows.keys().next_back().copied().unwrap_or(0);
        let next_id = file.next_id.max(max_id + 1);
        if next_id != file.next_id {
            tracing::warn!(
                stored = file.next_id,
                corrected = next_id,
                "job table next_id behind existing rows"
            );
        }

        Ok(Some(Table { next_id, rows }))
    }

    /// Abre una conexión (handle) sobre la tabla
    pub fn connect(&self, slot: usize) -> Connection {
        Connection {
            slot,
            store: self.clone(),
        }
    }

    /// Ruta al archivo de la tabla
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, table: &Table) -> DispatchResult<()> {
        write_json_atomic(&self.path, &table.to_file())
    }
}

/// Handle reutilizable sobre el store.
///
/// Las conexiones viven dentro del pool; nadie fuera del pool debería
/// crearlas salvo en tests.
pub struct Connection {
    /// Número de slot dentro del pool
    slot: usize,

    store: JobStore,
}

impl Connection {
    /// Slot del pool al que pertenece esta conexión
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Inserta un job nuevo (`pending`, sin resultado) y retorna su ID
    pub fn create(&mut self, text: &str) -> DispatchResult<JobId> {
        let id = self.reserve_id();
        match self.insert(id, text) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.release_id(id);
                Err(e)
            }
        }
    }

    /// Reserva el próximo ID sin escribir nada en disco.
    ///
    /// El ID queda fijado cuando [`Connection::insert`] persiste su fila.
    pub fn reserve_id(&mut self) -> JobId {
        let mut table = self.store.lock();
        let id = table.next_id;
        table.next_id += 1;
        id
    }

    /// Devuelve un ID reservado que no llegó a tener fila, si nadie reservó
    /// otro después
    pub fn release_id(&mut self, id: JobId) {
        let mut table = self.store.lock();
        if table.next_id == id + 1 && !table.rows.contains_key(&id) {
            table.next_id = id;
        }
    }

    /// Inserta la fila de un ID ya reservado
    pub fn insert(&mut self, id: JobId, text: &str) -> DispatchResult<()> {
        let mut table = self.store.lock();

        if table.rows.contains_key(&id) {
            return Err(DispatchError::Validation(format!("Request id {} already exists", id)));
        }

        let previous_next_id = table.next_id;
        table.next_id = previous_next_id.max(id + 1);
        table.rows.insert(id, JobRecord::new(id, text.to_string()));

        if let Err(e) = self.store.persist(&table) {
            table.rows.remove(&id);
            table.next_id = previous_next_id;
            return Err(e);
        }

        tracing::debug!(slot = self.slot, id, "job row inserted");
        Ok(())
    }

    /// Obtiene el registro completo de un job
    pub fn get(&self, id: JobId) -> DispatchResult<JobRecord> {
        let table = self.store.lock();
        table.rows.get(&id).cloned().ok_or(DispatchError::NotFound(id))
    }

    /// Marca un job como completado con su resultado.
    ///
    /// No importa el estado previo: un segundo complete sobrescribe.
    /// Un ID desconocido es `NotFound`.
    pub fn complete(&mut self, id: JobId, result: &str) -> DispatchResult<()> {
        let mut table = self.store.lock();

        let previous = match table.rows.get_mut(&id) {
            Some(row) => {
                let previous = row.clone();
                row.mark_completed(result.to_string());
                previous
            }
            None => return Err(DispatchError::NotFound(id)),
        };

        if let Err(e) = self.store.persist(&table) {
            table.rows.insert(id, previous);
            return Err(e);
        }

        tracing::debug!(slot = self.slot, id, "job row completed");
        Ok(())
    }

    /// IDs de todos los jobs pendientes, en orden de ID
    pub fn pending_ids(&self) -> Vec<JobId> {
        let table = self.store.lock();
        table
            .rows
            .values()
            .filter(|row| row.is_pending())
            .map(|row| row.id)
            .collect()
    }

    /// Número de filas en la tabla
    pub fn count(&self) -> usize {
        self.store.lock().rows.len()
    }
}
