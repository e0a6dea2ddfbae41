use std::path::{Path, PathBuf};

use getset::Getters;
use tokio::fs;

use crate::{
    config::{MigrationConfig, LEGACY_DRIVER, OVERLAY_DRIVER},
    container,
    log::DiagnosticLog,
    overlay::LayerConverter,
    state,
    utils::{self, remove_tree},
    MigrateError, MigrateResult,
};

use super::{replicate_image_store, Phase};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives a storage root one phase forward per [`run`](Migrator::run).
///
/// Each run inspects the storage root, performs the single transition its phase calls for and
/// returns the phase reached. Runs are safe to repeat and safe to interrupt:
///
/// - `Unmigrated`: the new root is built in a staging directory next to its final location and
///   renamed into place only when complete. Any failure removes the staging directory, so the
///   root stays `Unmigrated` and the legacy root is never written to.
/// - `MigratedUncommitted`: the legacy image store and legacy root are removed. A failure leaves
///   the root `MigratedUncommitted`, which the next run resumes.
/// - `Committed` and `Absent`: nothing to do.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Migrator {
    /// The run's settings.
    config: MigrationConfig,

    /// Failure report sink.
    diagnostics: Option<DiagnosticLog>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Migrator {
    /// Creates a migrator.
    pub fn new(config: MigrationConfig) -> Self {
        let diagnostics = config.get_diagnostic_log().clone().map(DiagnosticLog::new);
        Self {
            config,
            diagnostics,
        }
    }

    /// Advances the storage root by one phase and returns the phase reached.
    ///
    /// # Errors
    /// Returns the error of the failing phase. Failures are also reported to the diagnostic log
    /// when one is configured; reporting never changes the returned error.
    pub async fn run(&self) -> MigrateResult<Phase> {
        let phase = match Phase::detect(&self.config).await {
            Ok(phase) => phase,
            Err(e) => {
                self.report("detect", &e).await;
                return Err(e);
            }
        };

        tracing::info!(
            "storage root {} is {}",
            self.config.get_root().display(),
            phase
        );

        match phase {
            Phase::Absent | Phase::Committed => Ok(phase),
            Phase::Unmigrated => match self.migrate_phase().await {
                Ok(()) => Ok(Phase::MigratedUncommitted),
                Err(e) => {
                    self.report("migrate", &e).await;
                    Err(e)
                }
            },
            Phase::MigratedUncommitted => match self.commit_phase().await {
                Ok(()) => Ok(Phase::Committed),
                Err(e) => {
                    self.report("commit", &e).await;
                    Err(e)
                }
            },
        }
    }

    /// Builds and publishes the new root, cleaning up after itself on failure.
    async fn migrate_phase(&self) -> MigrateResult<()> {
        tracing::info!(
            "starting {} -> {} migration",
            LEGACY_DRIVER,
            OVERLAY_DRIVER
        );

        let mut patched = Vec::new();
        let result = self.build_and_publish(&mut patched).await;
        if let Err(e) = &result {
            tracing::error!("migration failed, cleaning up: {}", e);
            self.cleanup_failed_migration(&patched).await;
        }

        result
    }

    async fn build_and_publish(&self, patched: &mut Vec<PathBuf>) -> MigrateResult<()> {
        let staging_root = self.config.overlay_staging_root();
        let overlay_root = self.config.overlay_root();

        remove_tree(&staging_root).await?;

        let state = state::build_state(self.config.legacy_root()).await?;

        let converter = LayerConverter::new(
            self.config.legacy_root(),
            &staging_root,
            *self.config.get_hardlink_files(),
        );
        converter.prepare().await?;
        converter.convert_all(&state).await?;
        tracing::info!("converted {} layers", state.len());

        replicate_image_store(&self.config).await?;

        container::switch_all_containers(self.config.containers_dir(), OVERLAY_DRIVER, patched)
            .await?;

        // Everything written into staging must be durable before it becomes visible
        utils::sync_filesystem(&staging_root).await?;
        publish(&staging_root, &overlay_root).await?;
        utils::sync_dir(self.config.get_root()).await?;

        tracing::info!("published {}", overlay_root.display());
        Ok(())
    }

    /// Restores the `Unmigrated` layout after a failed migrate phase. Best effort: every
    /// failure here is logged, never returned, so the original error reaches the caller.
    async fn cleanup_failed_migration(&self, patched: &[PathBuf]) {
        for path in patched.iter().rev() {
            if let Err(e) = container::patch_config_file(path, LEGACY_DRIVER).await {
                tracing::warn!("failed to restore {}: {}", path.display(), e);
            }
        }

        let leftovers = [
            self.config.overlay_staging_root(),
            utils::staging_path(&self.config.overlay_image_root()),
            self.config.overlay_image_root(),
        ];

        for dir in leftovers {
            if let Err(e) = remove_tree(&dir).await {
                tracing::warn!("failed to remove {}: {}", dir.display(), e);
            }
        }
    }

    /// Removes the superseded legacy data.
    async fn commit_phase(&self) -> MigrateResult<()> {
        tracing::info!("committing {} migration", OVERLAY_DRIVER);

        remove_tree(self.config.overlay_staging_root()).await?;

        let legacy_images = self.config.legacy_image_root();
        if utils::path_exists(&self.config.overlay_image_root()).await? {
            remove_committed(&legacy_images).await?;
        } else if utils::path_exists(&legacy_images).await? {
            tracing::warn!(
                "keeping {}: no {} image store to replace it",
                legacy_images.display(),
                OVERLAY_DRIVER
            );
        }

        remove_committed(&self.config.legacy_root()).await?;

        tracing::info!("removed {} data", LEGACY_DRIVER);
        Ok(())
    }

    async fn report(&self, phase: &str, error: &MigrateError) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics
                .record_failure(phase, self.config.get_root(), error)
                .await;
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Migrates the storage root at `root` one phase forward.
///
/// The first call on a legacy root builds and publishes the new root. The next call removes the
/// legacy root. Further calls do nothing. The diagnostic log path is taken from the
/// [`DIAGNOSTIC_LOGFILE_ENV_VAR`](utils::DIAGNOSTIC_LOGFILE_ENV_VAR) environment variable.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> overlaymigrate::MigrateResult<()> {
/// // Safe to call at every start
/// overlaymigrate::migrate("/var/lib/docker").await?;
/// # Ok(())
/// # }
/// ```
pub async fn migrate(root: impl Into<PathBuf>) -> MigrateResult<()> {
    Migrator::new(MigrationConfig::from_env(root)).run().await?;
    Ok(())
}

/// Makes a fully built staging directory visible under its final name.
async fn publish(staging: &Path, target: &Path) -> MigrateResult<()> {
    fs::rename(staging, target)
        .await
        .map_err(|source| MigrateError::Publish {
            from: staging.to_path_buf(),
            to: target.to_path_buf(),
            source,
        })
}

async fn remove_committed(dir: &Path) -> MigrateResult<()> {
    remove_tree(dir).await.map_err(|e| MigrateError::Commit {
        path: dir.to_path_buf(),
        source: Box::new(e),
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
