//! Migration configuration.

mod defaults;
mod migration;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use migration::*;
