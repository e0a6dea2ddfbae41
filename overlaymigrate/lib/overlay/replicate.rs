use std::{
    fs::Metadata,
    os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
};

use nix::sys::stat::{mknod, Mode, SFlag};
use tokio::fs;

use crate::{
    utils,
    whiteout::{self, LegacyName},
    MigrateError, MigrateResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Replicates a directory tree into a new location, preserving file types, modes, ownership and
/// extended attributes.
///
/// - Directories are recreated and get their original mode once their contents are written
/// - Regular files are hard-linked when enabled and possible, copied otherwise
/// - Symlinks are recreated with the same target, never dereferenced
/// - FIFOs, sockets and device nodes are recreated as the same kind of node
///
/// With marker skipping enabled, legacy deletion markers and reserved legacy names are left
/// behind so their new-driver equivalents can be created separately.
#[derive(Debug, Clone)]
pub struct TreeReplicator {
    /// Names the tree in errors, usually a layer ID.
    label: String,

    /// Whether regular files may be hard-linked instead of copied.
    hardlink: bool,

    /// Whether legacy marker and reserved entries are skipped.
    skip_markers: bool,
}

/// I/O context for errors raised while replicating.
trait ReplicateContext<T> {
    fn at(self, label: &str, path: &Path) -> MigrateResult<T>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TreeReplicator {
    /// Creates a replicator that copies every entry.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hardlink: false,
            skip_markers: false,
        }
    }

    /// Enables or disables hard-linking of regular files.
    pub fn hardlink(mut self, hardlink: bool) -> Self {
        self.hardlink = hardlink;
        self
    }

    /// Enables or disables skipping of legacy markers and reserved names.
    pub fn skip_markers(mut self, skip_markers: bool) -> Self {
        self.skip_markers = skip_markers;
        self
    }

    /// Replicates `source_dir` as `dest_dir`. `dest_dir` must not exist yet, its parent must.
    ///
    /// # Errors
    /// Returns [`MigrateError::LayerConversion`] naming the failing path on any I/O error.
    pub async fn replicate(
        &self,
        source_dir: impl AsRef<Path>,
        dest_dir: impl AsRef<Path>,
    ) -> MigrateResult<()> {
        let source_dir = source_dir.as_ref();
        let dest_dir = dest_dir.as_ref();
        let label = self.label.as_str();

        let root_metadata = fs::symlink_metadata(source_dir)
            .await
            .at(label, source_dir)?;
        fs::create_dir(dest_dir).await.at(label, dest_dir)?;
        set_mode(dest_dir, 0o700).await.at(label, dest_dir)?;

        let mut stack = vec![PathBuf::new()];
        let mut dirs = vec![(PathBuf::new(), root_metadata)];

        while let Some(relative) = stack.pop() {
            let current = source_dir.join(&relative);
            let mut entries = fs::read_dir(&current).await.at(label, &current)?;

            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await.at(label, &current)? {
                children.push(entry.file_name());
            }
            children.sort();

            for name in children {
                if self.skip_markers && whiteout::classify(&name) != LegacyName::Content {
                    tracing::debug!("skipping legacy marker: {}", current.join(&name).display());
                    continue;
                }

                let child = relative.join(&name);
                let source_path = source_dir.join(&child);
                let target_path = dest_dir.join(&child);
                let metadata = fs::symlink_metadata(&source_path)
                    .await
                    .at(label, &source_path)?;

                if metadata.is_dir() {
                    tracing::debug!("creating directory: {}", target_path.display());
                    fs::create_dir(&target_path).await.at(label, &target_path)?;
                    set_mode(&target_path, 0o700).await.at(label, &target_path)?;
                    stack.push(child.clone());
                    dirs.push((child, metadata));
                } else {
                    self.replicate_entry(&source_path, &target_path, &metadata)
                        .await?;
                }
            }
        }

        // Apply directory metadata deepest first so restrictive modes never block writes.
        for (relative, metadata) in dirs.into_iter().rev() {
            let source_path = source_dir.join(&relative);
            let target_path = dest_dir.join(&relative);
            chown(&target_path, &metadata).at(label, &target_path)?;
            copy_xattrs(&source_path, &target_path);
            set_mode(&target_path, metadata.mode())
                .await
                .at(label, &target_path)?;
        }

        Ok(())
    }

    /// Replicates a single non-directory entry.
    async fn replicate_entry(
        &self,
        source_path: &Path,
        target_path: &Path,
        metadata: &Metadata,
    ) -> MigrateResult<()> {
        let label = self.label.as_str();
        let file_type = metadata.file_type();

        if file_type.is_file() {
            if self.hardlink {
                match fs::hard_link(source_path, target_path).await {
                    Ok(()) => {
                        tracing::debug!(
                            "linked file: {} -> {}",
                            source_path.display(),
                            target_path.display()
                        );
                        return Ok(());
                    }
                    Err(e) => tracing::debug!(
                        "hard link failed for {}, copying instead: {}",
                        source_path.display(),
                        e
                    ),
                }
            }

            tracing::debug!(
                "copying file: {} -> {}",
                source_path.display(),
                target_path.display()
            );
            fs::copy(source_path, target_path)
                .await
                .at(label, target_path)?;
        } else if file_type.is_symlink() {
            let link_target = fs::read_link(source_path).await.at(label, source_path)?;
            tracing::debug!(
                "creating symlink: {} -> {}",
                target_path.display(),
                link_target.display()
            );
            fs::symlink(&link_target, target_path)
                .await
                .at(label, target_path)?;

            // Symlinks have no mode of their own
            return chown(target_path, metadata).at(label, target_path);
        } else {
            tracing::debug!(
                "replicating special node ({}): {}",
                describe_node(metadata),
                target_path.display()
            );
            let kind = SFlag::from_bits_truncate(metadata.mode() as libc::mode_t & libc::S_IFMT);
            let perm = Mode::from_bits_truncate(metadata.mode() as libc::mode_t & 0o7777);
            mknod(target_path, kind, perm, metadata.rdev() as libc::dev_t)
                .map_err(std::io::Error::from)
                .at(label, target_path)?;
        }

        chown(target_path, metadata).at(label, target_path)?;
        copy_xattrs(source_path, target_path);
        set_mode(target_path, metadata.mode())
            .await
            .at(label, target_path)?;

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
    tracing::trace!(
        "applied mode {} ({:#o}) to {}",
        utils::format_mode(mode),
        mode & 0o7777,
        path.display()
    );
    Ok(())
}

/// Gives `path` the owner recorded in `metadata`, without following symlinks.
pub(crate) fn chown(path: &Path, metadata: &Metadata) -> std::io::Result<()> {
    std::os::unix::fs::lchown(path, Some(metadata.uid()), Some(metadata.gid()))
}

/// Copies extended attributes from `source` to `target`. Failures are logged and ignored since
/// the target filesystem or the caller's privileges may not allow every namespace.
fn copy_xattrs(source: &Path, target: &Path) {
    let names = match xattr::list(source) {
        Ok(names) => names,
        Err(e) => {
            tracing::debug!("cannot list xattrs of {}: {}", source.display(), e);
            return;
        }
    };

    for name in names {
        match xattr::get(source, &name) {
            Ok(Some(value)) => {
                if let Err(e) = xattr::set(target, &name, &value) {
                    tracing::warn!(
                        "failed to copy xattr {:?} to {}: {}",
                        name,
                        target.display(),
                        e
                    );
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(
                "cannot read xattr {:?} of {}: {}",
                name,
                source.display(),
                e
            ),
        }
    }
}

fn describe_node(metadata: &Metadata) -> &'static str {
    let file_type = metadata.file_type();
    if file_type.is_socket() {
        "socket"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_char_device() {
        "character device"
    } else if file_type.is_block_device() {
        "block device"
    } else {
        "unknown"
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T> ReplicateContext<T> for std::io::Result<T> {
    fn at(self, label: &str, path: &Path) -> MigrateResult<T> {
        self.map_err(|source| MigrateError::conversion(label, path, source))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
