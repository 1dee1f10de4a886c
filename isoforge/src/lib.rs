//! isoforge - build VMware virtual machine images from installation ISOs.
//!
//! A build creates a disk and a VM descriptor, boots the installer, types a
//! boot command over VNC, waits for the installed system to accept SSH,
//! runs a provisioning hook and shuts the VM down. The output directory is
//! the resulting artifact.

pub mod artifact;
pub mod builder;
pub mod config;
pub mod driver;
pub mod guest;
pub mod hook;
pub mod logging;
pub mod net;
pub mod pipeline;
pub mod ui;
pub mod util;
pub mod vmx;
pub mod vnc;

pub use artifact::Artifact;
pub use builder::{BuildContext, Builder};
pub use config::{BuildConfig, RawConfig};
pub use driver::{Driver, VmwareDriver};
pub use hook::{NoopHook, ProvisionHook, ShellHook};
pub use isoforge_shared::errors::{BuildError, BuildResult, MultiError};
pub use ui::{TracingUi, Ui};
