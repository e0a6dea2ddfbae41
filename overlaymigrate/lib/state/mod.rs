//! Reconstruction of the legacy driver's layer graph.
//!
//! The legacy root stores the graph implicitly: `layers/<id>` lists the ancestors of a layer one
//! per line, nearest first, and `diff/<id>` holds the layer's content delta. [`build_state`]
//! reads both into a [`State`] without modifying anything on disk.

mod builder;
mod layer;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use builder::*;
pub use layer::*;
