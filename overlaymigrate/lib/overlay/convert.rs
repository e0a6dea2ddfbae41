use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use getset::Getters;
use tokio::fs;

use crate::{
    state::{legacy_content_dir, Layer, MetaKind, State},
    utils::{
        OVERLAY_DIFF_SUBDIR, OVERLAY_LINK_DIR, OVERLAY_LINK_FILENAME, OVERLAY_LOWER_FILENAME,
        OVERLAY_WORK_SUBDIR,
    },
    whiteout::{self, OverlayMarker},
    MigrateError, MigrateResult,
};

use super::{encode_lower, link_id, replicate::chown, TreeReplicator};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Converts legacy layers into the new driver's layout under a staging root.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct LayerConverter {
    /// The legacy driver's root directory.
    legacy_root: PathBuf,

    /// The directory the new layout is built in.
    staging_root: PathBuf,

    /// Whether regular files are hard-linked instead of copied when possible.
    hardlink: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerConverter {
    /// Creates a new converter.
    pub fn new(
        legacy_root: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
        hardlink: bool,
    ) -> Self {
        Self {
            legacy_root: legacy_root.into(),
            staging_root: staging_root.into(),
            hardlink,
        }
    }

    /// Creates the staging root and its link directory.
    pub async fn prepare(&self) -> MigrateResult<()> {
        let link_dir = self.staging_root.join(OVERLAY_LINK_DIR);
        fs::create_dir_all(&link_dir)
            .await
            .map_err(|e| MigrateError::filesystem(&link_dir, e))?;
        fs::set_permissions(&self.staging_root, std::fs::Permissions::from_mode(0o710))
            .await
            .map_err(|e| MigrateError::filesystem(&self.staging_root, e))
    }

    /// Converts every layer of `state`, concurrently.
    ///
    /// Fails as a whole if any single layer fails.
    pub async fn convert_all(&self, state: &State) -> MigrateResult<()> {
        futures::future::try_join_all(state.layers().iter().map(|layer| self.convert(layer)))
            .await?;
        Ok(())
    }

    /// Converts one layer.
    ///
    /// Replicates `diff/<id>` without its legacy markers, recreates each marker record as the
    /// new driver's marker node, and writes the layer's link and parent chain descriptors.
    pub async fn convert(&self, layer: &Layer) -> MigrateResult<()> {
        let id = layer.get_id().as_str();
        let source_dir = legacy_content_dir(&self.legacy_root, id);
        let layer_dir = self.staging_root.join(id);
        let diff_dir = layer_dir.join(OVERLAY_DIFF_SUBDIR);

        tracing::info!("converting layer {}", id);
        fs::create_dir(&layer_dir)
            .await
            .map_err(|e| MigrateError::conversion(id, &layer_dir, e))?;

        TreeReplicator::new(id)
            .hardlink(self.hardlink)
            .skip_markers(true)
            .replicate(&source_dir, &diff_dir)
            .await?;

        for meta in layer.get_meta() {
            let target = diff_dir.join(meta.get_path());
            OverlayMarker::for_kind(*meta.get_kind()).create(&target)?;

            if *meta.get_kind() == MetaKind::Whiteout {
                let marker = legacy_marker_path(&source_dir, meta.get_path());
                let metadata = fs::symlink_metadata(&marker)
                    .await
                    .map_err(|e| MigrateError::conversion(id, &marker, e))?;
                chown(&target, &metadata).map_err(|e| MigrateError::conversion(id, &target, e))?;
            }
        }

        let link = link_id(id);
        let link_file = layer_dir.join(OVERLAY_LINK_FILENAME);
        fs::write(&link_file, &link)
            .await
            .map_err(|e| MigrateError::conversion(id, &link_file, e))?;

        let link_path = self.staging_root.join(OVERLAY_LINK_DIR).join(&link);
        let link_target = Path::new("..").join(id).join(OVERLAY_DIFF_SUBDIR);
        fs::symlink(&link_target, &link_path)
            .await
            .map_err(|e| MigrateError::conversion(id, &link_path, e))?;

        if !layer.is_base() {
            let lower_file = layer_dir.join(OVERLAY_LOWER_FILENAME);
            fs::write(&lower_file, encode_lower(layer.get_parent_ids()))
                .await
                .map_err(|e| MigrateError::conversion(id, &lower_file, e))?;

            let work_dir = layer_dir.join(OVERLAY_WORK_SUBDIR);
            fs::create_dir(&work_dir)
                .await
                .map_err(|e| MigrateError::conversion(id, &work_dir, e))?;
            fs::set_permissions(&work_dir, std::fs::Permissions::from_mode(0o700))
                .await
                .map_err(|e| MigrateError::conversion(id, &work_dir, e))?;
        }

        tracing::debug!(
            "converted layer {} ({} markers, {} parents)",
            id,
            layer.get_meta().len(),
            layer.get_parent_ids().len()
        );
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the legacy marker file that records a deletion of `path`.
fn legacy_marker_path(content_dir: &Path, path: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    content_dir.join(parent).join(whiteout::encode(name))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
