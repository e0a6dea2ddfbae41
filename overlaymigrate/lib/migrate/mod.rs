//! The two-phase migrate and commit controller.
//!
//! The storage root itself is the only record of progress. Which phase runs is derived from
//! which driver roots exist, and the one step that must be atomic, making the new root visible,
//! is a single directory rename:
//!
//! ```text
//!            migrate                     commit
//! Unmigrated ───────→ MigratedUncommitted ──────→ Committed
//! (aufs)              (aufs + overlay2)           (overlay2)
//! ```

mod image;
mod migrator;
mod phase;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use image::*;
pub use migrator::*;
pub use phase::*;
