//! Keystroke delivery to the VM's console.
//!
//! Boot command lines are expanded ([`expand_template`]), parsed into
//! [`BootKey`]s ([`parse_boot_command`]) and typed through a
//! [`KeyboardChannel`], normally a [`VncClient`] connected to the remote
//! display VMware exposes for the VM.

mod client;
mod keys;

pub use client::{RfbVersion, VncClient};
pub use keys::{BootKey, BootTemplateData, expand_template, keysym, parse_boot_command};

use crate::pipeline::PipelineSignals;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::time::Duration;

/// Pause between two keystrokes so slow boot loaders do not drop input.
const KEY_INTERVAL: Duration = Duration::from_millis(10);

/// Something that accepts raw key presses and releases.
#[async_trait]
pub trait KeyboardChannel: Send {
    async fn key_event(&mut self, keysym: u32, down: bool) -> BuildResult<()>;
}

/// Type `keys`, holding shift where needed. Checks cancellation between keys.
pub async fn type_keys(
    keyboard: &mut dyn KeyboardChannel,
    keys: &[BootKey],
    signals: &PipelineSignals,
) -> BuildResult<()> {
    for key in keys {
        if signals.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        let Some((sym, shift)) = key.keysym() else {
            if let BootKey::Wait(duration) = key {
                tracing::debug!(?duration, "Boot command wait");
                signals.sleep(*duration).await?;
            }
            continue;
        };

        if shift {
            keyboard.key_event(keysym::SHIFT_L, true).await?;
        }
        keyboard.key_event(sym, true).await?;
        keyboard.key_event(sym, false).await?;
        if shift {
            keyboard.key_event(keysym::SHIFT_L, false).await?;
        }
        signals.sleep(KEY_INTERVAL).await?;
    }
    Ok(())
}

/// Expand and type every boot command line in order.
pub async fn type_boot_command(
    keyboard: &mut dyn KeyboardChannel,
    lines: &[String],
    data: &BootTemplateData,
    signals: &PipelineSignals,
) -> BuildResult<()> {
    for line in lines {
        let expanded = expand_template(line, data)?;
        tracing::debug!(command = %expanded, "Typing boot command");
        type_keys(keyboard, &parse_boot_command(&expanded), signals).await?;
    }
    Ok(())
}
