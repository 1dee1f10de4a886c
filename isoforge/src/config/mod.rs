//! Build template decoding, defaulting and validation.

pub mod constants;
mod duration;
mod options;

pub use duration::parse_duration;
pub use options::{BuildConfig, RawConfig};
