//! Error types for the image build pipeline.

use std::fmt;

/// Result alias used across isoforge.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while preparing or running a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A single configuration problem detected during prepare.
    #[error("{0}")]
    Config(String),

    /// Every configuration problem found in one prepare pass.
    #[error("{0}")]
    Validation(MultiError),

    /// The virtualization product failed or is missing.
    #[error("driver error: {0}")]
    Driver(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port allocation, file server or guest connectivity failure.
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provisioning failed: {0}")]
    Provision(String),

    /// Remote display (RFB) protocol failure.
    #[error("vnc error: {0}")]
    Vnc(String),

    /// The build was cancelled while the operation was waiting.
    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl BuildError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BuildError::Cancelled)
    }
}

/// Aggregate of independent errors, reported together.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<BuildError>,
}

impl MultiError {
    pub fn new(errors: Vec<BuildError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[BuildError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume the collected errors, yielding `Ok(())` when there are none.
    pub fn into_result(self) -> Result<(), BuildError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(BuildError::Validation(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s) occurred:", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n* {}", err)?;
        }
        Ok(())
    }
}
