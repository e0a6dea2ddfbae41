//! `overlaymigrate` converts a container engine's aufs storage root to overlay2 in place.
//!
//! # Overview
//!
//! A storage root that was written by the aufs driver holds every image layer as a plain
//! directory plus a small index recording each layer's ancestors. overlay2 needs the same content
//! in a different layout, with a different encoding of deleted files. This crate rebuilds that
//! layout next to the aufs root, rewrites the driver recorded in each container's configuration
//! and, once the new root has been published, removes the aufs data.
//!
//! # Phases
//!
//! Migration is split in two phases so that no crash can leave a root unusable:
//!
//! - **migrate** builds `overlay2/` in a staging directory and renames it into place. The aufs
//!   root is only ever read.
//! - **commit** deletes the aufs root and its image store.
//!
//! Each call to [`migrate`] runs the phase the on-disk state calls for, so it is meant to be
//! called on every start until the root is committed.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use overlaymigrate::{config::MigrationConfig, Migrator, Phase};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::builder()
//!         .root("/var/lib/docker")
//!         .diagnostic_log("/var/log/overlaymigrate.log")
//!         .build();
//!
//!     let migrator = Migrator::new(config);
//!     if migrator.run().await? == Phase::MigratedUncommitted {
//!         // Start the engine on overlay2, then drop the aufs data
//!         migrator.run().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`] - Migration settings and driver names
//! - [`container`] - Driver rewriting in container configurations
//! - [`migrate`] - The two-phase controller
//! - [`overlay`] - overlay2 layout construction
//! - [`state`] - aufs layer graph reconstruction
//! - [`utils`] - Common paths and filesystem helpers
//! - [`whiteout`] - Deletion marker encodings of both drivers
//!
//! # Platform Support
//!
//! Linux only. Creating whiteout devices and `trusted.*` extended attributes requires root.

#![warn(missing_docs)]

mod error;
mod log;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod config;
pub mod container;
pub mod migrate;
pub mod overlay;
pub mod state;
pub mod utils;
pub mod whiteout;

pub use error::*;
pub use log::*;
pub use migrate::{migrate, Migrator, Phase};
