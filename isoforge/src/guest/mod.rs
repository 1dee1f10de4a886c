//! Guest communication.
//!
//! ## Architecture
//!
//! - **Communicator**: runs commands inside the guest
//! - **GuestConnector**: turns a reachable guest address into a Communicator
//! - **wait_for_guest**: bounded, cancellable wait until the guest accepts a connection

mod probe;
mod ssh;

pub use probe::wait_for_guest;
pub use ssh::{SshCommunicator, SshConnector};

use crate::config::BuildConfig;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;
use std::net::SocketAddr;
use std::sync::Arc;

/// Result of a command run inside the guest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Command channel into a running guest.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Run a shell command in the guest. A non-zero exit status is reported
    /// through `RemoteOutput`, not as an error.
    async fn run(&self, command: &str) -> BuildResult<RemoteOutput>;

    fn address(&self) -> SocketAddr;
}

/// Establishes a communicator once the guest's port is reachable.
#[async_trait]
pub trait GuestConnector: Send + Sync {
    /// Connect and authenticate. An error means "not ready yet" to the
    /// caller, which retries until its deadline.
    async fn connect(
        &self,
        addr: SocketAddr,
        config: &BuildConfig,
    ) -> BuildResult<Arc<dyn Communicator>>;
}
