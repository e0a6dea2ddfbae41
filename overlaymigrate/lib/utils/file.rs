use std::{
    os::fd::AsRawFd,
    path::{Path, PathBuf},
};

use tokio::fs;

use crate::{MigrateError, MigrateResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Formats the permission bits of a mode like `ls -l` does, e.g. `rwxr-x---`.
pub fn format_mode(mode: u32) -> String {
    let mut out = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Returns the staging path of `dir`, a sibling with [`STAGING_SUFFIX`](super::STAGING_SUFFIX)
/// appended to its name.
pub fn staging_path(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().unwrap_or_default().to_os_string();
    name.push(super::STAGING_SUFFIX);
    dir.with_file_name(name)
}

/// Checks whether a path exists without following a trailing symlink.
pub async fn path_exists(path: &Path) -> MigrateResult<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MigrateError::filesystem(path, e)),
    }
}

/// Flushes directory entries of `dir` to disk.
pub async fn sync_dir(dir: &Path) -> MigrateResult<()> {
    let file = fs::File::open(dir)
        .await
        .map_err(|e| MigrateError::filesystem(dir, e))?;
    file.sync_all()
        .await
        .map_err(|e| MigrateError::filesystem(dir, e))
}

/// Flushes every pending write of the filesystem holding `dir` to disk.
pub async fn sync_filesystem(dir: &Path) -> MigrateResult<()> {
    let path = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        nix::unistd::syncfs(file.as_raw_fd()).map_err(std::io::Error::from)
    })
    .await?
    .map_err(|e| MigrateError::filesystem(dir, e))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
