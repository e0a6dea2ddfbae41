//! Translation between the two drivers' deletion marker conventions.
//!
//! The legacy driver marks a deleted path with an empty regular file whose name is the deleted
//! name prefixed with `.wh.`. An opaque directory (one whose lower contents are hidden) carries a
//! `.wh..wh..opq` file. Names with the `.wh..wh.` prefix are otherwise reserved for the legacy
//! driver's own bookkeeping.
//!
//! The new driver marks a deleted path with a character device numbered `0:0` under the deleted
//! name, and an opaque directory with the `trusted.overlay.opaque` extended attribute.

use std::{
    ffi::{OsStr, OsString},
    fs::Metadata,
    os::unix::{
        ffi::OsStrExt,
        fs::{FileTypeExt, MetadataExt},
    },
    path::Path,
};

use nix::sys::stat::{mknod, Mode, SFlag};

use crate::{state::MetaKind, MigrateError, MigrateResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Prefix of a legacy deletion marker file name.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// Prefix of the legacy driver's reserved names.
pub const WHITEOUT_META_PREFIX: &str = ".wh..wh.";

/// Name of the legacy opaque directory marker.
pub const WHITEOUT_OPAQUE: &str = ".wh..wh..opq";

/// Extended attribute marking an overlay directory as opaque.
pub const OVERLAY_OPAQUE_XATTR: &str = "trusted.overlay.opaque";

/// Value of [`OVERLAY_OPAQUE_XATTR`] on an opaque directory.
pub const OVERLAY_OPAQUE_VALUE: &[u8] = b"y";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a single legacy directory entry name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyName<'a> {
    /// Ordinary layer content.
    Content,

    /// A deletion marker for the contained name.
    Whiteout(&'a OsStr),

    /// The marker hiding every lower entry of the containing directory.
    Opaque,

    /// Legacy driver bookkeeping that is neither content nor a marker.
    Reserved,
}

/// The representation the new driver needs to mark a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMarker {
    /// A `0:0` character device at the deleted path.
    Whiteout,

    /// The [`OVERLAY_OPAQUE_XATTR`] attribute on the directory.
    Opaque,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Encodes a deleted name as a legacy marker file name.
///
/// Inverse of [`decode`] for any non-empty path segment that does not itself start with
/// [`WHITEOUT_PREFIX`].
pub fn encode(name: impl AsRef<OsStr>) -> OsString {
    let mut encoded = OsString::from(WHITEOUT_PREFIX);
    encoded.push(name.as_ref());
    encoded
}

/// Decodes a legacy marker file name into the name it deletes.
///
/// Returns `None` for anything that is not a plain deletion marker, including opaque and
/// reserved names.
pub fn decode(name: &OsStr) -> Option<&OsStr> {
    match classify(name) {
        LegacyName::Whiteout(name) => Some(name),
        _ => None,
    }
}

/// Classifies a legacy directory entry by its name.
pub fn classify(name: &OsStr) -> LegacyName<'_> {
    let bytes = name.as_bytes();
    if bytes == WHITEOUT_OPAQUE.as_bytes() {
        return LegacyName::Opaque;
    }

    if bytes.starts_with(WHITEOUT_META_PREFIX.as_bytes()) {
        return LegacyName::Reserved;
    }

    match bytes.strip_prefix(WHITEOUT_PREFIX.as_bytes()) {
        Some(rest) if !rest.is_empty() => LegacyName::Whiteout(OsStr::from_bytes(rest)),
        _ => LegacyName::Content,
    }
}

/// Returns true if `metadata` describes a new-driver whiteout node.
pub fn is_overlay_whiteout(metadata: &Metadata) -> bool {
    metadata.file_type().is_char_device() && metadata.rdev() == 0
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OverlayMarker {
    /// Returns the new driver's representation of a marker kind.
    pub fn for_kind(kind: MetaKind) -> Self {
        match kind {
            MetaKind::Whiteout => OverlayMarker::Whiteout,
            MetaKind::Opaque => OverlayMarker::Opaque,
        }
    }

    /// Materializes the marker at `path`.
    ///
    /// For [`OverlayMarker::Whiteout`], `path` is the deleted path and must not exist yet. For
    /// [`OverlayMarker::Opaque`], `path` is the existing directory.
    pub fn create(&self, path: &Path) -> MigrateResult<()> {
        match self {
            OverlayMarker::Whiteout => {
                tracing::debug!("creating whiteout: {}", path.display());
                mknod(path, SFlag::S_IFCHR, Mode::empty(), 0).map_err(|errno| {
                    MigrateError::WhiteoutCreation {
                        path: path.to_path_buf(),
                        source: errno.into(),
                    }
                })
            }
            OverlayMarker::Opaque => {
                tracing::debug!("marking directory opaque: {}", path.display());
                xattr::set(path, OVERLAY_OPAQUE_XATTR, OVERLAY_OPAQUE_VALUE).map_err(|source| {
                    MigrateError::WhiteoutCreation {
                        path: path.to_path_buf(),
                        source,
                    }
                })
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
