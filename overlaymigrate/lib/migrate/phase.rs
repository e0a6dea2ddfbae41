use std::fmt::{self, Display};

use crate::{config::MigrationConfig, utils, MigrateResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where a storage root stands in the migration, derived purely from what exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Neither driver root exists; there is nothing to migrate.
    Absent,

    /// Only the legacy root exists.
    Unmigrated,

    /// Both roots exist. The new root is complete since it is only ever published whole.
    MigratedUncommitted,

    /// Only the new root exists.
    Committed,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Phase {
    /// Derives the phase from the presence of the two driver roots.
    pub fn from_presence(legacy_exists: bool, overlay_exists: bool) -> Self {
        match (legacy_exists, overlay_exists) {
            (false, false) => Phase::Absent,
            (true, false) => Phase::Unmigrated,
            (true, true) => Phase::MigratedUncommitted,
            (false, true) => Phase::Committed,
        }
    }

    /// Inspects the storage root of `config`.
    pub async fn detect(config: &MigrationConfig) -> MigrateResult<Self> {
        let legacy_exists = utils::path_exists(&config.legacy_root()).await?;
        let overlay_exists = utils::path_exists(&config.overlay_root()).await?;
        Ok(Self::from_presence(legacy_exists, overlay_exists))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Absent => write!(f, "absent"),
            Phase::Unmigrated => write!(f, "unmigrated"),
            Phase::MigratedUncommitted => write!(f, "migrated-uncommitted"),
            Phase::Committed => write!(f, "committed"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
