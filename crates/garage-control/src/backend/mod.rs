//! Built-in interior backends.
//!
//! - [`script`]: runs one executable per action from a script directory.
//! - [`simulated`]: in-memory environment that settles after a delay.

pub mod script;
pub mod simulated;

#[cfg(any(test, feature = "test-utils"))]
pub mod recording;
