//! Directory and file names of the two storage layouts.

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The legacy driver's sub directory holding one parent-chain file per layer.
pub const LEGACY_LAYERS_SUBDIR: &str = "layers";

/// The legacy driver's sub directory holding one content directory per layer.
pub const LEGACY_DIFF_SUBDIR: &str = "diff";

/// The new driver's per-layer content directory.
pub const OVERLAY_DIFF_SUBDIR: &str = "diff";

/// The new driver's per-layer work directory, present on layers with parents.
pub const OVERLAY_WORK_SUBDIR: &str = "work";

/// The new driver's directory of short link names.
pub const OVERLAY_LINK_DIR: &str = "l";

/// The new driver's per-layer file holding the layer's short link name.
pub const OVERLAY_LINK_FILENAME: &str = "link";

/// The new driver's per-layer parent-chain descriptor.
pub const OVERLAY_LOWER_FILENAME: &str = "lower";

/// The sub directory of the storage root holding one directory per container.
pub const CONTAINERS_SUBDIR: &str = "containers";

/// The container configuration file carrying the storage driver name.
pub const CONTAINER_CONFIG_FILENAME: &str = "config.v2.json";

/// The container host configuration file.
pub const CONTAINER_HOSTCONFIG_FILENAME: &str = "hostconfig.json";

/// The sub directory of the storage root holding the per-driver image stores.
pub const IMAGE_SUBDIR: &str = "image";

/// The suffix of a directory that is being built and is not yet visible under its final name.
pub const STAGING_SUFFIX: &str = ".migrating";
