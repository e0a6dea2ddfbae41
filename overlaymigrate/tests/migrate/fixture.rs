use std::{
    collections::BTreeMap,
    fs,
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use walkdir::WalkDir;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

pub const BASE_LAYER: &str = "b38c03118c1e41289cf0972f11453c9b";

pub const CHILD_LAYER: &str = "b8936bbae21948ed826207ced6fa19c5";

pub const CONTAINER_ID: &str = "bebe92422caf828ab21ae39974a0c003a29970ec09c6e5529bbb24f71eb9ca2ef";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A storage root in the legacy layout, removed on drop.
///
/// ```text
/// aufs/
/// ├── layers/
/// │   ├── <base>          (empty, no parents)
/// │   └── <child>         ("<base>")
/// └── diff/
///     ├── <base>/test
///     └── <child>/.wh.test   (only with a whiteout)
/// containers/<container>/
/// ├── config.v2.json      ({"Driver": "aufs"})
/// ├── hostconfig.json     ({})
/// └── checkpoints/
/// ```
pub struct Fixture {
    dir: TempDir,
}

/// The observable state of one entry in a [`snapshot`].
#[derive(Debug, PartialEq, Eq)]
pub struct EntrySnapshot {
    mode: u32,
    uid: u32,
    gid: u32,
    mtime: (i64, i64),
    contents: Option<Vec<u8>>,
    link_target: Option<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Fixture {
    /// Creates the legacy root. The child layer deletes `test` only if `with_whiteout` is set,
    /// since translating the whiteout requires root.
    pub fn new(with_whiteout: bool) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path();

        let layers = root.join("aufs/layers");
        fs::create_dir_all(&layers)?;
        fs::write(layers.join(BASE_LAYER), "")?;
        fs::set_permissions(layers.join(BASE_LAYER), fs::Permissions::from_mode(0o755))?;
        fs::write(layers.join(CHILD_LAYER), BASE_LAYER)?;
        fs::set_permissions(layers.join(CHILD_LAYER), fs::Permissions::from_mode(0o666))?;

        let base = root.join("aufs/diff").join(BASE_LAYER);
        let child = root.join("aufs/diff").join(CHILD_LAYER);
        fs::create_dir_all(&base)?;
        fs::create_dir_all(&child)?;
        fs::write(base.join("test"), "")?;
        if with_whiteout {
            fs::write(child.join(".wh.test"), "")?;
        }

        let container = root.join("containers").join(CONTAINER_ID);
        fs::create_dir_all(container.join("checkpoints"))?;
        fs::write(container.join("config.v2.json"), r#"{"Driver": "aufs"}"#)?;
        fs::write(container.join("hostconfig.json"), "{}")?;

        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(path)
    }

    pub fn container_config(&self) -> PathBuf {
        self.join("containers").join(CONTAINER_ID).join("config.v2.json")
    }

    pub fn legacy_layer(&self, id: &str) -> PathBuf {
        self.join("aufs/diff").join(id)
    }

    pub fn overlay_layer(&self, id: &str) -> PathBuf {
        self.join("overlay2").join(id)
    }

    pub fn legacy_snapshot(&self) -> anyhow::Result<BTreeMap<PathBuf, EntrySnapshot>> {
        snapshot(&self.join("aufs"))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Records every entry below `dir` by relative path.
///
/// Link counts are left out: hard-linked layers share inodes with the tree they came from.
pub fn snapshot(dir: &Path) -> anyhow::Result<BTreeMap<PathBuf, EntrySnapshot>> {
    let mut entries = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let metadata = fs::symlink_metadata(path)?;
        let file_type = metadata.file_type();

        let contents = file_type.is_file().then(|| fs::read(path)).transpose()?;
        let link_target = file_type.is_symlink().then(|| fs::read_link(path)).transpose()?;

        entries.insert(
            path.strip_prefix(dir)?.to_path_buf(),
            EntrySnapshot {
                mode: metadata.mode(),
                uid: metadata.uid(),
                gid: metadata.gid(),
                mtime: (metadata.mtime(), metadata.mtime_nsec()),
                contents,
                link_target,
            },
        );
    }

    Ok(entries)
}
