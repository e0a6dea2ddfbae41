use sha2::{Digest, Sha256};

use crate::utils::OVERLAY_LINK_DIR;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Length of a link id.
pub const LINK_ID_LEN: usize = 26;

/// Separator between entries of a `lower` file.
pub const LOWER_SEPARATOR: char = ':';

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Derives the short link id of a layer.
///
/// Link ids keep overlay mount options short. They only need to be unique within a root, so they
/// are derived from the layer ID, which makes repeated conversions produce identical trees.
pub fn link_id(layer_id: &str) -> String {
    let digest = Sha256::digest(layer_id.as_bytes());
    hex::encode_upper(&digest[..LINK_ID_LEN / 2])
}

/// Encodes a parent chain, nearest ancestor first, as the content of a `lower` file.
pub fn encode_lower<S: AsRef<str>>(parent_ids: &[S]) -> String {
    parent_ids
        .iter()
        .map(|id| format!("{}/{}", OVERLAY_LINK_DIR, link_id(id.as_ref())))
        .collect::<Vec<_>>()
        .join(&LOWER_SEPARATOR.to_string())
}

/// Decodes the content of a `lower` file into link ids, nearest ancestor first.
pub fn decode_lower(contents: &str) -> Vec<String> {
    contents
        .trim()
        .split(LOWER_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .strip_prefix(OVERLAY_LINK_DIR)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(entry)
                .to_string()
        })
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
