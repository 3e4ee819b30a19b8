// Submodule declaration
// -----------------------------------------------------------------------------
mod login_guard;

// Re-export
// -----------------------------------------------------------------------------
pub use login_guard::*;
