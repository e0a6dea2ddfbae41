use tokio::fs;

use crate::{
    config::MigrationConfig,
    overlay::TreeReplicator,
    utils::{self, remove_tree},
    MigrateError, MigrateResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Replicates the legacy driver's image store as the new driver's image store.
///
/// Image and layer metadata are keyed by driver name but reference layers by the same IDs under
/// both drivers, so the store is copied verbatim. The copy is built in a staging directory and
/// renamed into place. A leftover store from an interrupted run is replaced.
///
/// Returns false if there is no legacy image store.
pub async fn replicate_image_store(config: &MigrationConfig) -> MigrateResult<bool> {
    let source = config.legacy_image_root();
    let target = config.overlay_image_root();
    let staging = utils::staging_path(&target);

    if !utils::path_exists(&source).await? {
        tracing::info!("no image store at {}", source.display());
        return Ok(false);
    }

    remove_tree(&staging).await?;
    remove_tree(&target).await?;

    tracing::info!(
        "replicating image store {} -> {}",
        source.display(),
        target.display()
    );
    TreeReplicator::new("image store")
        .replicate(&source, &staging)
        .await?;

    fs::rename(&staging, &target)
        .await
        .map_err(|source| MigrateError::Publish {
            from: staging.clone(),
            to: target.clone(),
            source,
        })?;

    Ok(true)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
