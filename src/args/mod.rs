//! Command-line argument parsing and handling.

pub mod convert;
pub mod definition;
pub mod oneshot;

// Re-export commonly used items
pub use definition::{Args, process_args};
