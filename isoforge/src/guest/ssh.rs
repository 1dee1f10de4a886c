//! SSH communicator on top of the system `ssh` client.

use super::{Communicator, GuestConnector, RemoteOutput};
use crate::config::BuildConfig;
use crate::util::process;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::process::Command;

/// Seconds `ssh` waits for the TCP connection.
const CONNECT_TIMEOUT_SECS: u32 = 5;

#[derive(Debug, Clone)]
pub struct SshCommunicator {
    addr: SocketAddr,
    username: String,
    password: Option<String>,
}

impl SshCommunicator {
    pub fn new(addr: SocketAddr, username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            addr,
            username: username.into(),
            password,
        }
    }

    /// Arguments for `ssh` running `command` on the guest.
    pub(crate) fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", CONNECT_TIMEOUT_SECS),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ];
        if self.password.is_none() {
            args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
        }
        args.extend([
            "-p".to_string(),
            self.addr.port().to_string(),
            format!("{}@{}", self.username, self.addr.ip()),
            "--".to_string(),
            command.to_string(),
        ]);
        args
    }

    fn command(&self, remote: &str) -> Command {
        match &self.password {
            Some(password) => {
                // sshpass -e reads the password from the environment, keeping
                // it out of the process list.
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                cmd.args(self.ssh_args(remote));
                cmd
            }
            None => {
                let mut cmd = Command::new("ssh");
                cmd.args(self.ssh_args(remote));
                cmd
            }
        }
    }
}

#[async_trait]
impl Communicator for SshCommunicator {
    async fn run(&self, command: &str) -> BuildResult<RemoteOutput> {
        tracing::debug!(addr = %self.addr, %command, "Running remote command");
        let out = process::output(&mut self.command(command)).await?;
        // 255 is ssh's own failure status, not the remote command's.
        if out.exit_code == Some(255) {
            return Err(BuildError::Network(format!(
                "ssh to {} failed: {}",
                self.addr,
                out.stderr.trim()
            )));
        }
        Ok(RemoteOutput {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    fn address(&self) -> SocketAddr {
        self.addr
    }
}

/// Default connector: authenticates by running `true` over SSH.
#[derive(Debug, Clone, Default)]
pub struct SshConnector;

#[async_trait]
impl GuestConnector for SshConnector {
    async fn connect(
        &self,
        addr: SocketAddr,
        config: &BuildConfig,
    ) -> BuildResult<Arc<dyn Communicator>> {
        let comm = SshCommunicator::new(addr, &config.ssh_username, config.ssh_password.clone());
        let out = comm.run("true").await?;
        if !out.success() {
            return Err(BuildError::Network(format!(
                "ssh handshake with {} exited with {:?}",
                addr, out.exit_code
            )));
        }
        Ok(Arc::new(comm))
    }
}
