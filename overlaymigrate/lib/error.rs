use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a migration-related operation.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// An error that occurred while migrating a storage root.
#[derive(pretty_error_debug::Debug, Error)]
pub enum MigrateError {
    /// The legacy layer index directory is absent or could not be listed.
    #[error("layer index unreadable: {path}: {source}")]
    LayerIndexUnreadable {
        /// The layer index directory.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A layer listed in the index has no content directory.
    #[error("layer content missing for {id}: {path}")]
    LayerContentMissing {
        /// The layer ID.
        id: String,

        /// The expected content directory.
        path: PathBuf,
    },

    /// A layer names a parent that is not in the layer index.
    #[error("dangling parent reference: layer {id} references unknown parent {parent}")]
    DanglingParent {
        /// The layer ID.
        id: String,

        /// The unresolved parent ID.
        parent: String,
    },

    /// Two index entries name the same layer.
    #[error("duplicate layer id {id}")]
    DuplicateLayer {
        /// The repeated layer ID.
        id: String,
    },

    /// The content directory of a layer could not be walked.
    #[error("failed to scan layer {id}: {source}")]
    LayerScan {
        /// The layer ID.
        id: String,

        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// An I/O error while materializing a layer in the new layout.
    #[error("failed to convert layer {id} at {path}: {source}")]
    LayerConversion {
        /// The layer ID.
        id: String,

        /// The path being written or read.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A deletion marker node could not be created.
    #[error("failed to create whiteout at {path}: {source}")]
    WhiteoutCreation {
        /// The whiteout node path.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A container configuration document could not be read or parsed.
    #[error("config unreadable: {path}: {source}")]
    ConfigUnreadable {
        /// The configuration file.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: AnyError,
    },

    /// The container directory could not be listed.
    #[error("containers unreadable: {path}: {source}")]
    ContainersUnreadable {
        /// The container directory.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A container configuration document could not be written back.
    #[error("failed to write config {path}: {source}")]
    ConfigWrite {
        /// The configuration file.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A staging directory could not be renamed into place.
    #[error("failed to publish {from} as {to}: {source}")]
    Publish {
        /// The staging directory.
        from: PathBuf,

        /// The final directory.
        to: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A directory tree could not be removed.
    #[error("failed to remove {path}: {source}")]
    Removal {
        /// The tree or entry being removed.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation on a path of the storage root failed.
    #[error("filesystem error at {path}: {source}")]
    FileSystem {
        /// The path operated on.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The superseded legacy data could not be removed.
    #[error("failed to remove {path} during commit: {source}")]
    Commit {
        /// The directory being removed.
        path: PathBuf,

        /// The underlying error.
        #[source]
        source: Box<MigrateError>,
    },

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred when a blocking task could not be joined.
    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MigrateError {
    /// Wraps any error as a [`MigrateError::Custom`].
    pub fn custom(error: impl Into<anyhow::Error>) -> MigrateError {
        MigrateError::Custom(AnyError::new(error))
    }

    /// Wraps an I/O error raised on `path`.
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> MigrateError {
        MigrateError::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Wraps an I/O error raised while converting a layer.
    pub(crate) fn conversion(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> MigrateError {
        MigrateError::LayerConversion {
            id: id.into(),
            path: path.into(),
            source,
        }
    }
}

impl AnyError {
    /// Wraps any error.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `MigrateResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> MigrateResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
