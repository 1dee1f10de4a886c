//! Types shared between the isoforge library and its binaries.

pub mod errors;

pub use errors::{BuildError, BuildResult, MultiError};
