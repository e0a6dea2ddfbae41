//! Failure reporting outside the normal return path.

mod diagnostic;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use diagnostic::*;
