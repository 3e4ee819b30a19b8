// Submodule declaration
// -----------------------------------------------------------------------------
mod engine;
mod policy;

// Re-export
// -----------------------------------------------------------------------------
pub use engine::*;
pub use policy::*;

#[cfg(test)]
mod policy_test;
