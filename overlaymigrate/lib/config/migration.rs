use std::path::PathBuf;

use getset::Getters;
use typed_builder::TypedBuilder;

use crate::utils::{self, CONTAINERS_SUBDIR, IMAGE_SUBDIR};

use super::{DEFAULT_HARDLINK_FILES, LEGACY_DRIVER, OVERLAY_DRIVER};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings of a single migration run.
///
/// # Example
///
/// ```
/// use overlaymigrate::config::MigrationConfig;
///
/// let config = MigrationConfig::builder()
///     .root("/var/lib/docker")
///     .diagnostic_log("/var/log/overlaymigrate.log")
///     .build();
///
/// assert_eq!(config.legacy_root().to_str(), Some("/var/lib/docker/aufs"));
/// assert_eq!(config.overlay_root().to_str(), Some("/var/lib/docker/overlay2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct MigrationConfig {
    /// The storage root containing both driver roots and the container directories.
    #[builder(setter(into))]
    root: PathBuf,

    /// Where failure reports are appended, if anywhere.
    #[builder(default, setter(strip_option, into))]
    diagnostic_log: Option<PathBuf>,

    /// Whether regular files are hard-linked into the new root when possible.
    #[builder(default = DEFAULT_HARDLINK_FILES)]
    hardlink_files: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MigrationConfig {
    /// Creates a configuration for `root` with defaults, taking the diagnostic log path from the
    /// [`DIAGNOSTIC_LOGFILE_ENV_VAR`](utils::DIAGNOSTIC_LOGFILE_ENV_VAR) environment variable.
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            diagnostic_log: utils::diagnostic_log_from_env(),
            hardlink_files: DEFAULT_HARDLINK_FILES,
        }
    }

    /// The legacy driver's root.
    pub fn legacy_root(&self) -> PathBuf {
        self.root.join(LEGACY_DRIVER)
    }

    /// The new driver's root.
    pub fn overlay_root(&self) -> PathBuf {
        self.root.join(OVERLAY_DRIVER)
    }

    /// Where the new driver's root is built before it is published.
    pub fn overlay_staging_root(&self) -> PathBuf {
        utils::staging_path(&self.overlay_root())
    }

    /// The legacy driver's image store.
    pub fn legacy_image_root(&self) -> PathBuf {
        self.image_dir().join(LEGACY_DRIVER)
    }

    /// The new driver's image store.
    pub fn overlay_image_root(&self) -> PathBuf {
        self.image_dir().join(OVERLAY_DRIVER)
    }

    /// The directory holding one directory per container.
    pub fn containers_dir(&self) -> PathBuf {
        self.root.join(CONTAINERS_SUBDIR)
    }

    fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_SUBDIR)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
