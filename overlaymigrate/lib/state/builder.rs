use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tokio::fs;
use walkdir::WalkDir;

use crate::{
    utils::{LEGACY_DIFF_SUBDIR, LEGACY_LAYERS_SUBDIR},
    whiteout::{self, LegacyName},
    MigrateError, MigrateResult,
};

use super::{Layer, Meta, State};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads the layer graph of a legacy driver root.
///
/// Layers are enumerated from `layers/` in file name order. Each layer's parent chain is read
/// from its index file and its marker records are collected by walking `diff/<id>` in file name
/// order.
///
/// # Arguments
/// * `legacy_root` - The legacy driver's root directory
///
/// # Errors
/// Returns error if:
/// * `layers/` is absent or an index file cannot be read
/// * `diff/<id>` is absent for an indexed layer
/// * A layer names a parent that is not indexed
/// * A content directory cannot be walked
pub async fn build_state(legacy_root: impl AsRef<Path>) -> MigrateResult<State> {
    let legacy_root = legacy_root.as_ref();
    let layers_dir = legacy_root.join(LEGACY_LAYERS_SUBDIR);
    let diff_dir = legacy_root.join(LEGACY_DIFF_SUBDIR);

    let ids = read_layer_ids(&layers_dir).await?;
    tracing::info!("found {} layers in {}", ids.len(), layers_dir.display());

    let mut chains = Vec::with_capacity(ids.len());
    for id in &ids {
        let index_path = layers_dir.join(id);
        let contents = fs::read_to_string(&index_path).await.map_err(|source| {
            MigrateError::LayerIndexUnreadable {
                path: index_path.clone(),
                source,
            }
        })?;
        chains.push(parse_parent_ids(&contents));
    }

    for id in &ids {
        let content_dir = diff_dir.join(id);
        let is_dir = fs::metadata(&content_dir)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);

        if !is_dir {
            return Err(MigrateError::LayerContentMissing {
                id: id.clone(),
                path: content_dir,
            });
        }
    }

    let metas = try_join_all(ids.iter().map(|id| {
        let id = id.clone();
        let content_dir = diff_dir.join(&id);
        async move {
            tokio::task::spawn_blocking(move || scan_markers(&id, &content_dir)).await?
        }
    }))
    .await?;

    let layers = ids
        .into_iter()
        .zip(chains)
        .zip(metas)
        .map(|((id, parent_ids), meta)| Layer::new(id, parent_ids, meta))
        .collect();

    State::new(layers)
}

/// Splits the content of a layer index file into parent IDs, nearest first.
pub fn parse_parent_ids(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Lists the layer IDs in the index directory, sorted by name.
async fn read_layer_ids(layers_dir: &Path) -> MigrateResult<Vec<String>> {
    let unreadable = |source| MigrateError::LayerIndexUnreadable {
        path: layers_dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(layers_dir).await.map_err(unreadable)?;
    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let file_type = entry.file_type().await.map_err(unreadable)?;
        if !file_type.is_file() {
            tracing::debug!("skipping non-file index entry: {}", entry.path().display());
            continue;
        }

        // Commit deletes every layer, so none may be skipped here
        let id = entry
            .file_name()
            .into_string()
            .map_err(|_| MigrateError::LayerIndexUnreadable {
                path: entry.path(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "layer id is not valid UTF-8",
                ),
            })?;
        ids.push(id);
    }

    ids.sort();
    Ok(ids)
}

/// Collects the marker records of one layer's content directory in walk order.
fn scan_markers(id: &str, content_dir: &Path) -> MigrateResult<Vec<Meta>> {
    let mut meta = Vec::new();
    let walker = WalkDir::new(content_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| classify_entry(entry) != Some(LegacyName::Reserved));

    for entry in walker {
        let entry = entry.map_err(|source| MigrateError::LayerScan {
            id: id.to_string(),
            source,
        })?;

        let relative_parent = entry
            .path()
            .parent()
            .and_then(|parent| parent.strip_prefix(content_dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        match whiteout::classify(entry.file_name()) {
            LegacyName::Whiteout(name) => {
                tracing::debug!("layer {}: whiteout {:?} in {:?}", id, name, relative_parent);
                meta.push(Meta::whiteout(relative_parent.join(name)));
            }
            LegacyName::Opaque => {
                tracing::debug!("layer {}: opaque directory {:?}", id, relative_parent);
                meta.push(Meta::opaque(relative_parent));
            }
            LegacyName::Content | LegacyName::Reserved => {}
        }
    }

    Ok(meta)
}

fn classify_entry(entry: &walkdir::DirEntry) -> Option<LegacyName<'_>> {
    (entry.depth() > 0).then(|| whiteout::classify(entry.file_name()))
}

/// Returns the legacy content directory of a layer.
pub fn legacy_content_dir(legacy_root: &Path, id: &str) -> PathBuf {
    legacy_root.join(LEGACY_DIFF_SUBDIR).join(id)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
