//! Utility functions and types.

mod env;
mod file;
mod path;
mod remove;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use env::*;
pub use file::*;
pub use path::*;
pub use remove::*;
