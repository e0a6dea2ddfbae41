//! Materialization of layers in the new driver's layout.
//!
//! Each converted layer gets its own directory under the new root:
//!
//! ```text
//! overlay2/
//! ├── l/
//! │   └── <link-id> -> ../<layer-id>/diff
//! └── <layer-id>/
//!     ├── diff/   - layer content, deletion markers translated
//!     ├── link    - the layer's link id
//!     ├── lower   - parent chain as `l/<link-id>` entries, nearest first (layers with parents)
//!     └── work/   - overlay work directory (layers with parents)
//! ```

mod convert;
mod lower;
mod replicate;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use convert::*;
pub use lower::*;
pub use replicate::*;
