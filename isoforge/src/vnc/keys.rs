//! Boot command parsing: template expansion and key sequences.

use isoforge_shared::errors::{BuildError, BuildResult};
use std::time::Duration;

/// X11 keysyms for the special keys a boot command can name.
pub mod keysym {
    pub const BACKSPACE: u32 = 0xff08;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const F1: u32 = 0xffbe;
    pub const SHIFT_L: u32 = 0xffe1;
    pub const DELETE: u32 = 0xffff;
    pub const SPACE: u32 = 0x0020;
}

/// One element of an expanded boot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKey {
    /// Printable character typed as-is (with shift where the layout needs it).
    Char(char),
    /// Named key, as an X11 keysym.
    Special(u32),
    /// Pause before typing the rest.
    Wait(Duration),
}

impl BootKey {
    /// Keysym and whether shift must be held while it is pressed.
    pub fn keysym(&self) -> Option<(u32, bool)> {
        match *self {
            // Latin-1 maps directly; everything else uses the Unicode keysym range.
            BootKey::Char(c) if (c as u32) < 0x100 => Some((c as u32, needs_shift(c))),
            BootKey::Char(c) => Some((0x0100_0000 | c as u32, false)),
            BootKey::Special(sym) => Some((sym, false)),
            BootKey::Wait(_) => None,
        }
    }
}

fn needs_shift(c: char) -> bool {
    c.is_ascii_uppercase() || "~!@#$%^&*()_+{}|:\"<>?".contains(c)
}

/// Values available to `{{ .Name }}` style placeholders.
#[derive(Debug, Clone, Default)]
pub struct BootTemplateData {
    pub http_ip: String,
    pub http_port: u16,
    pub name: String,
}

/// Expand `{{ .HTTPIP }}`, `{{ .HTTPPort }}` and `{{ .Name }}`.
pub fn expand_template(input: &str, data: &BootTemplateData) -> BuildResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            BuildError::Config(format!("Error processing boot_command: unclosed '{{{{' in {:?}", input))
        })?;
        let value = match after[..end].trim() {
            ".HTTPIP" => data.http_ip.clone(),
            ".HTTPPort" => data.http_port.to_string(),
            ".Name" => data.name.clone(),
            other => {
                return Err(BuildError::Config(format!(
                    "Error processing boot_command: unknown variable {:?}",
                    other
                )));
            }
        };
        out.push_str(&value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn special_key(name: &str) -> Option<BootKey> {
    let key = match name {
        "enter" | "return" => BootKey::Special(keysym::RETURN),
        "esc" => BootKey::Special(keysym::ESCAPE),
        "tab" => BootKey::Special(keysym::TAB),
        "bs" => BootKey::Special(keysym::BACKSPACE),
        "del" => BootKey::Special(keysym::DELETE),
        "spacebar" => BootKey::Special(keysym::SPACE),
        "up" => BootKey::Special(keysym::UP),
        "down" => BootKey::Special(keysym::DOWN),
        "left" => BootKey::Special(keysym::LEFT),
        "right" => BootKey::Special(keysym::RIGHT),
        "wait" => BootKey::Wait(Duration::from_secs(1)),
        "wait5" => BootKey::Wait(Duration::from_secs(5)),
        "wait10" => BootKey::Wait(Duration::from_secs(10)),
        _ => {
            let n: u32 = name.strip_prefix('f')?.parse().ok()?;
            if !(1..=12).contains(&n) {
                return None;
            }
            BootKey::Special(keysym::F1 + n - 1)
        }
    };
    Some(key)
}

/// Turn one expanded boot command line into keys. Unknown `<...>` groups are
/// typed literally.
pub fn parse_boot_command(line: &str) -> Vec<BootKey> {
    let mut keys = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        if rest.starts_with('<') {
            let group = rest
                .find('>')
                .and_then(|end| special_key(&rest[1..end].to_lowercase()).map(|k| (k, end)));
            if let Some((key, end)) = group {
                keys.push(key);
                rest = &rest[end + 1..];
                continue;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            keys.push(BootKey::Char(c));
        }
        rest = chars.as_str();
    }

    keys
}
