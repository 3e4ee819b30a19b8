// Submodule declaration
// -----------------------------------------------------------------------------
mod builder;

// Re-export
// -----------------------------------------------------------------------------
pub use builder::*;
