// Submodule declaration
// -----------------------------------------------------------------------------
mod health;
mod scans;
mod scheduler;

// Re-export
// -----------------------------------------------------------------------------
pub use health::*;
pub use scans::*;
pub use scheduler::*;

#[cfg(test)]
mod scans_test;
