//! # Escritura Durable de Archivos
//! src/jobs/durable.rs
//!
//! La tabla de jobs y el snapshot de la cola se reescriben completos en cada
//! cambio. Ambos pasan por aquí: se escribe un archivo temporal hermano, se
//! hace fsync y se renombra sobre el destino (atómico en Unix). Un lector
//! nunca ve un archivo a medio escribir.

use crate::error::DispatchResult;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Ruta del archivo temporal usado durante la escritura
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Crea el directorio padre de `path` si no existe
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Serializa `value` como JSON y reemplaza `path` atómicamente
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> DispatchResult<()> {
    let tmp = temp_path(path);

    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&tmp, path)?;

    // El rename solo es durable cuando el directorio también llega a disco.
    // No todas las plataformas permiten abrir un directorio, así que es best effort.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
