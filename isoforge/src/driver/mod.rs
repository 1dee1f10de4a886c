//! Driver - Operations on the host virtualization product.
//!
//! ## Architecture
//!
//! - **Driver**: disk creation, VM power operations and guest discovery
//! - **VmwareDriver**: implementation on top of `vmrun` and `vmware-vdiskmanager`
//!
//! Exactly one driver is bound per build. [`select_driver`] probes the
//! installation paths known for the current platform and binds the first
//! product whose [`Driver::verify`] succeeds.

mod network;
mod vmware;

pub use network::{find_lease_ip, host_ip_from_dhcpd_conf, parse_leases, Lease};
pub use vmware::{Product, VmwareDriver};

use crate::vnc::{KeyboardChannel, VncClient};
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

/// Virtual disk allocation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskFormat {
    /// Single growable file
    GrowableSingle,
    /// Growable, split into 2GB extents
    GrowableSplit,
    /// Single preallocated file
    PreallocatedSingle,
    /// Preallocated, split into 2GB extents
    PreallocatedSplit,
}

impl DiskFormat {
    /// Disk type code understood by `vmware-vdiskmanager -t`.
    pub fn vdiskmanager_type(self) -> u8 {
        match self {
            DiskFormat::GrowableSingle => 0,
            DiskFormat::GrowableSplit => 1,
            DiskFormat::PreallocatedSingle => 2,
            DiskFormat::PreallocatedSplit => 3,
        }
    }
}

/// Virtual disk to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpec {
    pub size_mb: u64,
    pub format: DiskFormat,
    pub adapter: String,
}

impl DiskSpec {
    pub fn growable(size_mb: u64) -> Self {
        Self {
            size_mb,
            format: DiskFormat::GrowableSplit,
            adapter: "lsilogic".to_string(),
        }
    }
}

/// Trait for host virtualization operations.
///
/// VM-level operations take the path of the VMX descriptor that identifies
/// the machine. The driver is shared read-only by every build step.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Product name for logging.
    fn name(&self) -> &str;

    /// Check that the product is installed and usable.
    async fn verify(&self) -> BuildResult<()>;

    async fn create_disk(&self, path: &Path, spec: &DiskSpec) -> BuildResult<()>;

    async fn start(&self, vmx: &Path, headless: bool) -> BuildResult<()>;

    /// Ask the VM to power off gracefully.
    async fn stop(&self, vmx: &Path) -> BuildResult<()>;

    /// Power the VM off immediately.
    async fn kill(&self, vmx: &Path) -> BuildResult<()>;

    async fn is_running(&self, vmx: &Path) -> BuildResult<bool>;

    /// Network address currently leased to the guest, if known yet.
    async fn guest_ip(&self, vmx: &Path) -> BuildResult<Option<IpAddr>>;

    /// Address of the host as reachable from the guest network.
    async fn host_ip(&self) -> BuildResult<IpAddr>;

    /// Open the keyboard channel of a VM whose remote display listens on `vnc_port`.
    async fn keyboard(&self, vnc_port: u16) -> BuildResult<Box<dyn KeyboardChannel>> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), vnc_port);
        let client = VncClient::connect(addr).await?;
        Ok(Box::new(client))
    }
}

/// Driver candidates for the current platform, in probe order.
fn candidates() -> Vec<VmwareDriver> {
    let mut drivers = Vec::new();
    if cfg!(target_os = "macos") {
        drivers.push(VmwareDriver::fusion("/Applications/VMware Fusion.app"));
    }
    if cfg!(target_os = "linux") {
        drivers.push(VmwareDriver::workstation());
    }
    drivers
}

/// Bind the first installed virtualization product.
pub async fn select_driver() -> BuildResult<Arc<dyn Driver>> {
    let mut failures = Vec::new();

    for driver in candidates() {
        match driver.verify().await {
            Ok(()) => {
                tracing::info!(driver = %driver.name(), "Selected virtualization driver");
                return Ok(Arc::new(driver));
            }
            Err(e) => {
                tracing::debug!(driver = %driver.name(), "Driver unavailable: {}", e);
                failures.push(format!("{}: {}", driver.name(), e));
            }
        }
    }

    if failures.is_empty() {
        return Err(BuildError::Driver(
            "no supported virtualization product for this platform".into(),
        ));
    }
    Err(BuildError::Driver(failures.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vdiskmanager_type_codes() {
        assert_eq!(DiskFormat::GrowableSingle.vdiskmanager_type(), 0);
        assert_eq!(DiskFormat::GrowableSplit.vdiskmanager_type(), 1);
        assert_eq!(DiskFormat::PreallocatedSingle.vdiskmanager_type(), 2);
        assert_eq!(DiskFormat::PreallocatedSplit.vdiskmanager_type(), 3);
    }

    #[test]
    fn test_growable_spec() {
        let spec = DiskSpec::growable(40_000);
        assert_eq!(spec.size_mb, 40_000);
        assert_eq!(spec.format, DiskFormat::GrowableSplit);
        assert_eq!(spec.adapter, "lsilogic");
    }
}
