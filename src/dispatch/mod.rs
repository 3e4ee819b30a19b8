// Submodule declaration
// -----------------------------------------------------------------------------
mod dispatcher;
mod job;
mod rate_limiter;
mod transport;
mod verification;
mod worker;

// Re-export
// -----------------------------------------------------------------------------
pub use dispatcher::*;
pub use job::*;
pub use rate_limiter::*;
pub use transport::*;
pub use verification::*;
pub use worker::*;

#[cfg(test)]
mod rate_limiter_test;
#[cfg(test)]
mod verification_test;
#[cfg(test)]
mod worker_test;
