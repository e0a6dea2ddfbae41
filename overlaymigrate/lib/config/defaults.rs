//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The name of the driver layers are migrated from.
pub const LEGACY_DRIVER: &str = "aufs";

/// The name of the driver layers are migrated to.
pub const OVERLAY_DRIVER: &str = "overlay2";

/// Whether regular files are hard-linked into the new root by default.
pub const DEFAULT_HARDLINK_FILES: bool = true;
