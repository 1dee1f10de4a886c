//! VMX descriptor files.
//!
//! A VMX file is a flat list of `key = "value"` lines. Keys are case
//! insensitive to VMware and are normalized to lower case here so that
//! template overrides replace defaults regardless of spelling. Quotes and
//! pipes inside values use VMware's `|XX` hex escapes.

use isoforge_shared::errors::{BuildError, BuildResult};
use std::collections::BTreeMap;
use std::path::Path;

pub type VmxData = BTreeMap<String, String>;

/// Keys the VNC step writes into the descriptor.
pub mod keys {
    pub const VNC_ENABLED: &str = "remotedisplay.vnc.enabled";
    pub const VNC_PORT: &str = "remotedisplay.vnc.port";
    pub const GENERATED_MAC: &str = "ethernet0.generatedaddress";
    pub const ENCODING: &str = ".encoding";
}

/// Inputs for the built-in descriptor template.
#[derive(Debug, Clone)]
pub struct VmxTemplate<'a> {
    pub name: &'a str,
    pub guest_os: &'a str,
    pub disk_file: &'a str,
    pub iso_path: &'a str,
}

/// Default descriptor for a fresh VM: one SCSI disk, the ISO on an IDE
/// CD-ROM, a NAT ethernet adapter with a generated MAC.
pub fn default_template(t: &VmxTemplate<'_>) -> VmxData {
    let entries = [
        (keys::ENCODING, "UTF-8"),
        ("config.version", "8"),
        ("virtualhw.version", "9"),
        ("displayname", t.name),
        ("guestos", t.guest_os),
        ("memsize", "512"),
        ("numvcpus", "1"),
        ("scsi0.present", "TRUE"),
        ("scsi0.virtualdev", "lsilogic"),
        ("scsi0:0.present", "TRUE"),
        ("scsi0:0.filename", t.disk_file),
        ("ide1:0.present", "TRUE"),
        ("ide1:0.devicetype", "cdrom-image"),
        ("ide1:0.filename", t.iso_path),
        ("ethernet0.present", "TRUE"),
        ("ethernet0.connectiontype", "nat"),
        ("ethernet0.addresstype", "generated"),
        ("ethernet0.virtualdev", "e1000"),
        ("ethernet0.wakeonpcktrcv", "FALSE"),
        ("usb.present", "TRUE"),
        ("floppy0.present", "FALSE"),
        ("msg.autoanswer", "TRUE"),
    ];

    let mut data: VmxData = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    data.insert("nvram".into(), format!("{}.nvram", t.name));
    data
}

/// Merge user overrides into `data`; overrides win.
pub fn merge(data: &mut VmxData, overrides: &BTreeMap<String, String>) {
    for (key, value) in overrides {
        data.insert(key.trim().to_lowercase(), value.clone());
    }
}

pub fn parse(contents: &str) -> VmxData {
    let mut data = VmxData::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!("Skipping malformed VMX line: {}", line);
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        data.insert(key.trim().to_lowercase(), unescape(value));
    }
    data
}

/// Encode descriptor data. `.encoding` comes first, the rest sorted by key.
pub fn encode(data: &VmxData) -> String {
    let mut out = String::new();
    if let Some(encoding) = data.get(keys::ENCODING) {
        out.push_str(&format!("{} = \"{}\"\n", keys::ENCODING, escape(encoding)));
    }
    for (key, value) in data.iter().filter(|(k, _)| k.as_str() != keys::ENCODING) {
        out.push_str(&format!("{} = \"{}\"\n", key, escape(value)));
    }
    out
}

pub async fn read_file(path: &Path) -> BuildResult<VmxData> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        BuildError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed reading VMX file {}: {}", path.display(), e),
        ))
    })?;
    Ok(parse(&contents))
}

pub async fn write_file(path: &Path, data: &VmxData) -> BuildResult<()> {
    tokio::fs::write(path, encode(data)).await.map_err(|e| {
        BuildError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed writing VMX file {}: {}", path.display(), e),
        ))
    })
}

fn escape(value: &str) -> String {
    value.replace('|', "|7C").replace('"', "|22")
}

fn unescape(value: &str) -> String {
    value.replace("|22", "\"").replace("|7C", "|").replace("|7c", "|")
}
