//! Build defaults and polling intervals.
//!
//! Centralized location for every default the template decoder applies.

use std::time::Duration;

/// Template defaults applied when an option is missing or zero.
pub mod defaults {
    pub const DISK_NAME: &str = "disk";
    pub const GUEST_OS_TYPE: &str = "other";
    pub const VM_NAME: &str = "packer";
    pub const OUTPUT_DIRECTORY: &str = "vmware";

    pub const HTTP_PORT_MIN: u16 = 8000;
    pub const HTTP_PORT_MAX: u16 = 9000;
    pub const VNC_PORT_MIN: u16 = 5900;
    pub const VNC_PORT_MAX: u16 = 6000;

    pub const SHUTDOWN_TIMEOUT: &str = "5m";
    pub const SSH_WAIT_TIMEOUT: &str = "20m";
    pub const SSH_PORT: u16 = 22;

    /// Virtual disk size in megabytes (sparse, grows as needed)
    pub const DISK_SIZE_MB: u64 = 40_000;
}

/// Intervals for the bounded polling loops inside build steps.
pub mod intervals {
    use super::Duration;

    /// Delay between guest reachability attempts
    pub const GUEST_PROBE: Duration = Duration::from_secs(5);

    /// Per-attempt TCP connect timeout when probing the guest
    pub const GUEST_CONNECT: Duration = Duration::from_secs(5);

    /// Delay between "is the VM still running" checks during shutdown
    pub const SHUTDOWN_POLL: Duration = Duration::from_secs(1);
}

/// Identifier attached to every artifact this builder produces.
pub const BUILDER_ID: &str = "isoforge.vmware";
