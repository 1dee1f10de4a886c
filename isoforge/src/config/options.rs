//! Template options and their validated, defaulted form.

use super::constants::defaults;
use super::duration::parse_duration;
use isoforge_shared::errors::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Options exactly as they appear in a build template.
///
/// Missing, empty and zero values mean "use the default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub vmdk_name: Option<String>,
    pub guest_os_type: Option<String>,
    pub iso_url: Option<String>,
    pub vm_name: Option<String>,
    pub output_directory: Option<String>,
    pub http_directory: Option<String>,
    pub http_port_min: Option<u16>,
    pub http_port_max: Option<u16>,
    pub boot_command: Vec<String>,
    pub boot_wait: Option<String>,
    pub shutdown_command: Option<String>,
    pub shutdown_timeout: Option<String>,
    pub ssh_username: Option<String>,
    pub ssh_password: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_wait_timeout: Option<String>,
    pub vmx_data: BTreeMap<String, String>,
    pub vnc_port_min: Option<u16>,
    pub vnc_port_max: Option<u16>,
    pub disk_size: Option<u64>,
    pub headless: bool,
}

/// Validated build configuration. Immutable once produced.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub disk_name: String,
    pub disk_size_mb: u64,
    pub guest_os_type: String,
    pub iso_url: String,
    pub vm_name: String,
    pub output_dir: PathBuf,
    pub http_dir: Option<PathBuf>,
    pub http_port_min: u16,
    pub http_port_max: u16,
    pub boot_command: Vec<String>,
    pub boot_wait: Duration,
    pub shutdown_command: Option<String>,
    pub shutdown_timeout: Duration,
    pub ssh_username: String,
    pub ssh_password: Option<String>,
    pub ssh_port: u16,
    pub ssh_wait_timeout: Duration,
    pub vmx_data: BTreeMap<String, String>,
    pub vnc_port_min: u16,
    pub vnc_port_max: u16,
    pub headless: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_zero(value: Option<u16>, default: u16) -> u16 {
    value.filter(|v| *v != 0).unwrap_or(default)
}

impl RawConfig {
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json)
            .map_err(|e| BuildError::Config(format!("Failed decoding template: {}", e)))
    }

    /// Apply defaults and validate.
    ///
    /// Always yields a fully defaulted configuration together with every
    /// violation found; callers decide whether the list is fatal.
    pub fn resolve(self) -> (BuildConfig, Vec<BuildError>) {
        let mut errs = Vec::new();

        let http_port_min = non_zero(self.http_port_min, defaults::HTTP_PORT_MIN);
        let http_port_max = non_zero(self.http_port_max, defaults::HTTP_PORT_MAX);
        let vnc_port_min = non_zero(self.vnc_port_min, defaults::VNC_PORT_MIN);
        let vnc_port_max = non_zero(self.vnc_port_max, defaults::VNC_PORT_MAX);

        if http_port_min > http_port_max {
            errs.push(BuildError::Config(
                "http_port_min must be less than http_port_max".into(),
            ));
        }

        let iso_url = non_empty(self.iso_url).unwrap_or_default();
        if iso_url.is_empty() {
            errs.push(BuildError::Config("An iso_url must be specified.".into()));
        }

        let ssh_username = non_empty(self.ssh_username).unwrap_or_default();
        if ssh_username.is_empty() {
            errs.push(BuildError::Config("An ssh_username must be specified.".into()));
        }

        let boot_wait = match non_empty(self.boot_wait) {
            Some(raw) => parse_duration(&raw).unwrap_or_else(|e| {
                errs.push(BuildError::Config(format!("Failed parsing boot_wait: {}", e)));
                Duration::ZERO
            }),
            None => Duration::ZERO,
        };

        let raw_shutdown =
            non_empty(self.shutdown_timeout).unwrap_or_else(|| defaults::SHUTDOWN_TIMEOUT.into());
        let shutdown_timeout = parse_duration(&raw_shutdown).unwrap_or_else(|e| {
            errs.push(BuildError::Config(format!(
                "Failed parsing shutdown_timeout: {}",
                e
            )));
            Duration::ZERO
        });

        let raw_ssh_wait =
            non_empty(self.ssh_wait_timeout).unwrap_or_else(|| defaults::SSH_WAIT_TIMEOUT.into());
        let ssh_wait_timeout = parse_duration(&raw_ssh_wait).unwrap_or_else(|e| {
            errs.push(BuildError::Config(format!(
                "Failed parsing ssh_wait_timeout: {}",
                e
            )));
            Duration::ZERO
        });

        if vnc_port_min > vnc_port_max {
            errs.push(BuildError::Config(
                "vnc_port_min must be less than vnc_port_max".into(),
            ));
        }

        let config = BuildConfig {
            disk_name: non_empty(self.vmdk_name).unwrap_or_else(|| defaults::DISK_NAME.into()),
            disk_size_mb: self
                .disk_size
                .filter(|size| *size != 0)
                .unwrap_or(defaults::DISK_SIZE_MB),
            guest_os_type: non_empty(self.guest_os_type)
                .unwrap_or_else(|| defaults::GUEST_OS_TYPE.into()),
            iso_url,
            vm_name: non_empty(self.vm_name).unwrap_or_else(|| defaults::VM_NAME.into()),
            output_dir: PathBuf::from(
                non_empty(self.output_directory)
                    .unwrap_or_else(|| defaults::OUTPUT_DIRECTORY.into()),
            ),
            http_dir: non_empty(self.http_directory).map(PathBuf::from),
            http_port_min,
            http_port_max,
            boot_command: self.boot_command,
            boot_wait,
            shutdown_command: non_empty(self.shutdown_command),
            shutdown_timeout,
            ssh_username,
            ssh_password: self.ssh_password.filter(|p| !p.is_empty()),
            ssh_port: non_zero(self.ssh_port, defaults::SSH_PORT),
            ssh_wait_timeout,
            vmx_data: self.vmx_data,
            vnc_port_min,
            vnc_port_max,
            headless: self.headless,
        };

        (config, errs)
    }
}

impl BuildConfig {
    pub fn disk_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.vmdk", self.disk_name))
    }

    pub fn vmx_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.vmx", self.vm_name))
    }

    /// Installation media as a local path (a `file://` prefix is stripped).
    pub fn iso_path(&self) -> &str {
        self.iso_url
            .strip_prefix("file://")
            .unwrap_or(self.iso_url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RawConfig {
        RawConfig {
            iso_url: Some("/isos/install.iso".into()),
            ssh_username: Some("vagrant".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let (config, errs) = minimal().resolve();
        assert!(errs.is_empty(), "{:?}", errs);
        assert_eq!(config.disk_name, "disk");
        assert_eq!(config.guest_os_type, "other");
        assert_eq!(config.vm_name, "packer");
        assert_eq!(config.output_dir, PathBuf::from("vmware"));
        assert_eq!((config.http_port_min, config.http_port_max), (8000, 9000));
        assert_eq!((config.vnc_port_min, config.vnc_port_max), (5900, 6000));
        assert_eq!(config.boot_wait, Duration::ZERO);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5 * 60));
        assert_eq!(config.ssh_wait_timeout, Duration::from_secs(20 * 60));
        assert_eq!(config.ssh_port, 22);
        assert_eq!(config.disk_size_mb, 40_000);
        assert!(config.http_dir.is_none());
        assert!(config.shutdown_command.is_none());
    }

    #[test]
    fn test_empty_strings_take_defaults() {
        let raw = RawConfig {
            shutdown_timeout: Some(String::new()),
            ssh_wait_timeout: Some(String::new()),
            vm_name: Some(String::new()),
            ..minimal()
        };
        let (config, errs) = raw.resolve();
        assert!(errs.is_empty());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(300));
        assert_eq!(config.ssh_wait_timeout, Duration::from_secs(1200));
        assert_eq!(config.vm_name, "packer");
    }

    #[test]
    fn test_errors_accumulate() {
        let raw = RawConfig {
            http_port_min: Some(9500),
            http_port_max: Some(9000),
            vnc_port_min: Some(6100),
            vnc_port_max: Some(6000),
            boot_wait: Some("soon".into()),
            shutdown_timeout: Some("-1m".into()),
            ssh_wait_timeout: Some("forever".into()),
            ..Default::default()
        };
        let (_, errs) = raw.resolve();
        let messages: Vec<String> = errs.iter().map(|e| e.to_string()).collect();

        assert_eq!(messages.len(), 7, "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("http_port_min")));
        assert!(messages.iter().any(|m| m.contains("vnc_port_min")));
        assert!(messages.iter().any(|m| m.contains("iso_url")));
        assert!(messages.iter().any(|m| m.contains("ssh_username")));
        assert!(messages.iter().any(|m| m.contains("boot_wait")));
        assert!(messages.iter().any(|m| m.contains("shutdown_timeout")));
        assert!(messages.iter().any(|m| m.contains("ssh_wait_timeout")));
    }

    #[test]
    fn test_equal_port_bounds_are_valid() {
        let raw = RawConfig {
            http_port_min: Some(8080),
            http_port_max: Some(8080),
            ..minimal()
        };
        let (_, errs) = raw.resolve();
        assert!(errs.is_empty());
    }

    #[test]
    fn test_from_json() {
        let raw = RawConfig::from_json(
            r#"{
                "iso_url": "file:///isos/ubuntu.iso",
                "ssh_username": "root",
                "boot_command": ["<esc><wait>", "linux<enter>"],
                "vmx_data": {"memsize": "1024"},
                "http_port_min": 8100
            }"#,
        )
        .unwrap();
        let (config, errs) = raw.resolve();
        assert!(errs.is_empty());
        assert_eq!(config.iso_path(), "/isos/ubuntu.iso");
        assert_eq!(config.boot_command.len(), 2);
        assert_eq!(config.vmx_data.get("memsize").map(String::as_str), Some("1024"));
        assert_eq!(config.http_port_min, 8100);
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert!(RawConfig::from_json(r#"{"iso_uri": "x"}"#).is_err());
    }

    #[test]
    fn test_paths_under_output_dir() {
        let (config, _) = RawConfig {
            output_directory: Some("out".into()),
            vm_name: Some("base".into()),
            vmdk_name: Some("root".into()),
            ..minimal()
        }
        .resolve();
        assert_eq!(config.vmx_path(), PathBuf::from("out/base.vmx"));
        assert_eq!(config.disk_path(), PathBuf::from("out/root.vmdk"));
    }
}
