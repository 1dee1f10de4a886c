//! Wait until the guest is reachable and accepts a communicator.

use super::{Communicator, GuestConnector};
use crate::config::BuildConfig;
use crate::config::constants::intervals;
use crate::driver::Driver;
use crate::pipeline::PipelineSignals;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Poll the guest until a communicator connects, `ssh_wait_timeout` elapses
/// or the build is cancelled.
///
/// Each attempt asks the driver for the guest address, checks the SSH port
/// accepts TCP connections, then hands the address to `connector`.
pub async fn wait_for_guest(
    driver: &dyn Driver,
    connector: &dyn GuestConnector,
    config: &BuildConfig,
    vmx: &Path,
    signals: &PipelineSignals,
) -> BuildResult<(SocketAddr, Arc<dyn Communicator>)> {
    let timeout = config.ssh_wait_timeout;
    tracing::debug!(timeout_secs = timeout.as_secs(), "Polling for guest readiness");

    let poll = async {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match try_connect(driver, connector, config, vmx).await {
                Ok(connected) => return Ok(connected),
                Err(e) => tracing::debug!(attempt, "Guest not ready: {}", e),
            }
            signals.sleep(intervals::GUEST_PROBE).await?;
        }
    };

    tokio::select! {
        result = tokio::time::timeout(timeout, poll) => match result {
            Ok(connected) => connected,
            Err(_) => Err(BuildError::Timeout(format!(
                "Timeout waiting for SSH after {}s",
                timeout.as_secs()
            ))),
        },
        _ = signals.cancelled() => Err(BuildError::Cancelled),
    }
}

async fn try_connect(
    driver: &dyn Driver,
    connector: &dyn GuestConnector,
    config: &BuildConfig,
    vmx: &Path,
) -> BuildResult<(SocketAddr, Arc<dyn Communicator>)> {
    let ip = driver
        .guest_ip(vmx)
        .await?
        .ok_or_else(|| BuildError::Network("guest address not known yet".into()))?;
    let addr = SocketAddr::new(ip, config.ssh_port);

    tokio::time::timeout(intervals::GUEST_CONNECT, TcpStream::connect(addr))
        .await
        .map_err(|_| BuildError::Network(format!("connect to {} timed out", addr)))?
        .map_err(|e| BuildError::Network(format!("connect to {}: {}", addr, e)))?;

    let comm = connector.connect(addr, config).await?;
    Ok((addr, comm))
}
