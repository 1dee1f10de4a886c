//! VMware Fusion / Workstation driver built on the product's CLI tools.

use super::network::{find_lease_ip, host_ip_from_dhcpd_conf};
use super::{DiskSpec, Driver};
use crate::util::process;
use crate::vmx;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Which VMware product the driver talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    Fusion,
    Workstation,
}

impl Product {
    /// Host type passed to `vmrun -T`.
    fn host_type(self) -> &'static str {
        match self {
            Product::Fusion => "fusion",
            Product::Workstation => "ws",
        }
    }
}

/// Driver backed by `vmrun` and `vmware-vdiskmanager`.
#[derive(Debug, Clone)]
pub struct VmwareDriver {
    product: Product,
    name: String,
    install_path: PathBuf,
    vmrun: PathBuf,
    vdiskmanager: PathBuf,
    dhcp_leases: PathBuf,
    dhcpd_conf: PathBuf,
}

impl VmwareDriver {
    /// VMware Fusion installed as an application bundle at `app_path`.
    pub fn fusion(app_path: impl Into<PathBuf>) -> Self {
        let app_path = app_path.into();
        let library = app_path.join("Contents/Library");
        Self {
            product: Product::Fusion,
            name: "VMware Fusion".to_string(),
            vmrun: library.join("vmrun"),
            vdiskmanager: library.join("vmware-vdiskmanager"),
            install_path: app_path,
            dhcp_leases: PathBuf::from("/var/db/vmware/vmnet-dhcpd-vmnet8.leases"),
            dhcpd_conf: PathBuf::from("/Library/Preferences/VMware Fusion/vmnet8/dhcpd.conf"),
        }
    }

    /// VMware Workstation installed in the standard Linux locations.
    pub fn workstation() -> Self {
        Self {
            product: Product::Workstation,
            name: "VMware Workstation".to_string(),
            install_path: PathBuf::from("/usr/lib/vmware"),
            vmrun: PathBuf::from("/usr/bin/vmrun"),
            vdiskmanager: PathBuf::from("/usr/bin/vmware-vdiskmanager"),
            dhcp_leases: PathBuf::from("/etc/vmware/vmnet8/dhcpd/dhcpd.leases"),
            dhcpd_conf: PathBuf::from("/etc/vmware/vmnet8/dhcpd/dhcpd.conf"),
        }
    }

    pub fn product(&self) -> Product {
        self.product
    }

    fn vmrun(&self) -> Command {
        let mut cmd = Command::new(&self.vmrun);
        cmd.arg("-T").arg(self.product.host_type());
        cmd
    }

    /// Arguments for `vmware-vdiskmanager` creating `path`.
    pub(crate) fn create_disk_args(path: &Path, spec: &DiskSpec) -> Vec<String> {
        vec![
            "-c".to_string(),
            "-s".to_string(),
            format!("{}M", spec.size_mb),
            "-a".to_string(),
            spec.adapter.clone(),
            "-t".to_string(),
            spec.format.vdiskmanager_type().to_string(),
            path.display().to_string(),
        ]
    }
}

/// Does `vmrun list` output mention `vmx`?
pub(crate) fn list_contains(list_output: &str, vmx: &Path) -> bool {
    let wanted = vmx.to_string_lossy();
    list_output
        .lines()
        .skip_while(|line| line.starts_with("Total running VMs"))
        .any(|line| line.trim() == wanted)
}

#[async_trait]
impl Driver for VmwareDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self) -> BuildResult<()> {
        if !self.install_path.exists() {
            return Err(BuildError::Driver(format!(
                "{} not found at path: {}",
                self.name,
                self.install_path.display()
            )));
        }
        for tool in [&self.vmrun, &self.vdiskmanager] {
            if !tool.exists() {
                return Err(BuildError::Driver(format!(
                    "Critical application '{}' not found",
                    tool.display()
                )));
            }
        }
        Ok(())
    }

    async fn create_disk(&self, path: &Path, spec: &DiskSpec) -> BuildResult<()> {
        let mut cmd = Command::new(&self.vdiskmanager);
        cmd.args(Self::create_disk_args(path, spec));
        process::run(&mut cmd).await?;
        Ok(())
    }

    async fn start(&self, vmx: &Path, headless: bool) -> BuildResult<()> {
        let mut cmd = self.vmrun();
        cmd.arg("start")
            .arg(vmx)
            .arg(if headless { "nogui" } else { "gui" });
        process::run(&mut cmd).await?;
        Ok(())
    }

    async fn stop(&self, vmx: &Path) -> BuildResult<()> {
        let mut cmd = self.vmrun();
        cmd.arg("stop").arg(vmx).arg("soft");
        process::run(&mut cmd).await?;
        Ok(())
    }

    async fn kill(&self, vmx: &Path) -> BuildResult<()> {
        let mut cmd = self.vmrun();
        cmd.arg("stop").arg(vmx).arg("hard");
        process::run(&mut cmd).await?;
        Ok(())
    }

    async fn is_running(&self, vmx: &Path) -> BuildResult<bool> {
        let vmx = tokio::fs::canonicalize(vmx).await?;
        let mut cmd = self.vmrun();
        cmd.arg("list");
        let out = process::run(&mut cmd).await?;
        Ok(list_contains(&out.stdout, &vmx))
    }

    async fn guest_ip(&self, vmx: &Path) -> BuildResult<Option<IpAddr>> {
        let data = vmx::read_file(vmx).await?;
        let Some(mac) = data.get(vmx::keys::GENERATED_MAC) else {
            tracing::debug!(vmx = %vmx.display(), "No generated MAC address yet");
            return Ok(None);
        };

        let leases = match tokio::fs::read_to_string(&self.dhcp_leases).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(find_lease_ip(&leases, mac))
    }

    async fn host_ip(&self) -> BuildResult<IpAddr> {
        let conf = tokio::fs::read_to_string(&self.dhcpd_conf).await.map_err(|e| {
            BuildError::Driver(format!(
                "Failed reading {}: {}",
                self.dhcpd_conf.display(),
                e
            ))
        })?;
        host_ip_from_dhcpd_conf(&conf).ok_or_else(|| {
            BuildError::Driver(format!(
                "No subnet declaration in {}",
                self.dhcpd_conf.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fusion_paths() {
        let driver = VmwareDriver::fusion("/Applications/VMware Fusion.app");
        assert_eq!(driver.product(), Product::Fusion);
        assert_eq!(
            driver.vmrun,
            PathBuf::from("/Applications/VMware Fusion.app/Contents/Library/vmrun")
        );
    }

    #[test]
    fn test_create_disk_args() {
        let args = VmwareDriver::create_disk_args(
            Path::new("/out/disk.vmdk"),
            &DiskSpec::growable(40_000),
        );
        assert_eq!(
            args,
            vec!["-c", "-s", "40000M", "-a", "lsilogic", "-t", "1", "/out/disk.vmdk"]
        );
    }

    #[test]
    fn test_list_contains() {
        let output = "Total running VMs: 2\n/vms/a/a.vmx\n/vms/b/packer.vmx\n";
        assert!(list_contains(output, Path::new("/vms/b/packer.vmx")));
        assert!(!list_contains(output, Path::new("/vms/c/packer.vmx")));
        assert!(!list_contains("Total running VMs: 0\n", Path::new("/vms/a/a.vmx")));
    }

    #[tokio::test]
    async fn test_verify_missing_install() {
        let driver = VmwareDriver::fusion("/nonexistent/VMware Fusion.app");
        let err = driver.verify().await.unwrap_err();
        assert!(err.to_string().contains("not found at path"));
    }
}
