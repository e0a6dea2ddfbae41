use std::{os::unix::fs::PermissionsExt, path::Path};

use tokio::fs;

use crate::{MigrateError, MigrateResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Recursively removes a directory tree, first granting the owner full access to every
/// directory inside it so restrictive modes do not stop the removal.
///
/// Does nothing if `dir` does not exist.
///
/// # Errors
/// Returns [`MigrateError::Removal`] naming `dir` if:
/// - Failed to read the metadata of `dir`
/// - Failed to remove the tree
pub async fn remove_tree(dir: impl AsRef<Path>) -> MigrateResult<()> {
    let dir = dir.as_ref();
    let metadata = match fs::symlink_metadata(dir).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(removal(dir, source)),
    };

    if !metadata.is_dir() {
        return fs::remove_file(dir)
            .await
            .map_err(|source| removal(dir, source));
    }

    let mut dir_stack = vec![dir.to_path_buf()];
    while let Some(current) = dir_stack.pop() {
        if let Ok(metadata) = fs::symlink_metadata(&current).await {
            let mode = metadata.permissions().mode();
            if mode & 0o700 != 0o700 {
                let _ = fs::set_permissions(&current, std::fs::Permissions::from_mode(mode | 0o700))
                    .await;
            }
        }

        if let Ok(mut entries) = fs::read_dir(&current).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(file_type) = entry.file_type().await {
                    if file_type.is_dir() {
                        dir_stack.push(entry.path());
                    }
                }
            }
        }
    }

    match fs::remove_dir_all(dir).await {
        Ok(_) => tracing::debug!("removed {}", dir.display()),
        Err(e) => {
            tracing::error!("failed to remove {}: {}", dir.display(), e);
            return Err(removal(dir, e));
        }
    }

    Ok(())
}

fn removal(path: &Path, source: std::io::Error) -> MigrateError {
    MigrateError::Removal {
        path: path.to_path_buf(),
        source,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
