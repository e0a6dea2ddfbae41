//! Rewriting of the storage driver recorded in container configurations.
//!
//! Containers persist the name of the driver that holds their read-write layer. After the layers
//! move to the new driver each container's documents must name it, while every other byte of the
//! document is written back unchanged.

use std::{
    collections::HashMap,
    io::Write,
    ops::Range,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use serde_json::{value::RawValue, Value};
use tokio::fs;

use crate::{
    utils::{CONTAINER_CONFIG_FILENAME, CONTAINER_HOSTCONFIG_FILENAME},
    AnyError, MigrateError, MigrateResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The configuration field naming the storage driver.
pub const DRIVER_FIELD: &str = "Driver";

/// The per-container documents that may carry [`DRIVER_FIELD`].
pub const CONTAINER_DOCUMENTS: [&str; 2] = [CONTAINER_CONFIG_FILENAME, CONTAINER_HOSTCONFIG_FILENAME];

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Rewrites the driver field of a configuration document.
///
/// Only the bytes of the top-level driver value change. Every other byte of the document,
/// including whitespace and escape sequences, is kept as it was. Returns `Ok(None)` when nothing
/// needs to change: the field already names `driver` or the document has no driver field at all.
///
/// # Errors
/// Returns error if the document is not a JSON object.
pub fn patch_driver(document: &[u8], driver: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let fields: HashMap<String, &RawValue> = serde_json::from_slice(document)?;
    let Some(current) = fields.get(DRIVER_FIELD) else {
        return Ok(None);
    };

    if serde_json::from_str::<Value>(current.get())?.as_str() == Some(driver) {
        return Ok(None);
    }

    let span = raw_span(document, current.get())
        .ok_or_else(|| anyhow::anyhow!("driver value is not part of the document"))?;
    let replacement = serde_json::to_vec(driver)?;

    let mut patched = Vec::with_capacity(document.len() + replacement.len());
    patched.extend_from_slice(&document[..span.start]);
    patched.extend_from_slice(&replacement);
    patched.extend_from_slice(&document[span.end..]);
    Ok(Some(patched))
}

/// Rewrites the driver field of one configuration file in place.
///
/// The new content is written to a temporary file next to `path` and renamed over it, so the
/// file is never observed half-written. Returns true if the file was rewritten.
pub async fn patch_config_file(path: impl AsRef<Path>, driver: &str) -> MigrateResult<bool> {
    let path = path.as_ref();
    let document = fs::read(path)
        .await
        .map_err(|e| MigrateError::ConfigUnreadable {
            path: path.to_path_buf(),
            source: AnyError::new(e),
        })?;

    let patched = patch_driver(&document, driver).map_err(|e| MigrateError::ConfigUnreadable {
        path: path.to_path_buf(),
        source: AnyError::new(e),
    })?;

    let Some(patched) = patched else {
        tracing::debug!("{} already up to date", path.display());
        return Ok(false);
    };

    let mode = fs::metadata(path)
        .await
        .map(|metadata| metadata.permissions().mode())
        .unwrap_or(0o600);

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, &patched, mode))
        .await?
        .map_err(|source| MigrateError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::info!("switched {} to driver {}", path.display(), driver);
    Ok(true)
}

/// Lists container directories under `containers_dir`, sorted by name. A missing directory
/// means there are no containers.
pub async fn list_containers(containers_dir: impl AsRef<Path>) -> MigrateResult<Vec<PathBuf>> {
    let containers_dir = containers_dir.as_ref();
    let unreadable = |path: &Path, source| MigrateError::ContainersUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut entries = match fs::read_dir(containers_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(unreadable(containers_dir, e)),
    };

    let mut containers = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| unreadable(containers_dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| unreadable(&entry.path(), e))?;
        if file_type.is_dir() {
            containers.push(entry.path());
        }
    }

    containers.sort();
    Ok(containers)
}

/// Switches every container under `containers_dir` to `driver`.
///
/// Each rewritten file is pushed to `patched` as soon as it is written, so a caller can roll
/// back a partial switch even when this function fails.
pub async fn switch_all_containers(
    containers_dir: impl AsRef<Path>,
    driver: &str,
    patched: &mut Vec<PathBuf>,
) -> MigrateResult<()> {
    let containers = list_containers(containers_dir).await?;
    tracing::info!("switching {} containers to {}", containers.len(), driver);

    for container in containers {
        for document in CONTAINER_DOCUMENTS {
            let path = container.join(document);
            match fs::metadata(&path).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("no {} in {}", document, container.display());
                    continue;
                }
                Err(e) => {
                    return Err(MigrateError::ConfigUnreadable {
                        path,
                        source: AnyError::new(e),
                    })
                }
            }

            if patch_config_file(&path, driver).await? {
                patched.push(path);
            }
        }
    }

    Ok(())
}

/// Locates `raw`, a slice borrowed from `document`, as a byte range of `document`.
fn raw_span(document: &[u8], raw: &str) -> Option<Range<usize>> {
    let start = (raw.as_ptr() as usize).checked_sub(document.as_ptr() as usize)?;
    let end = start.checked_add(raw.len())?;
    (end <= document.len()).then_some(start..end)
}

fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.as_file()
        .set_permissions(std::fs::Permissions::from_mode(mode))?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
