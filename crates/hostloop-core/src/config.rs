//! Session configuration handed to [`HostLoop`](crate::runner::HostLoop).

use crate::{error::ConfigError, pacing::PacingConfig, rewind::RewindConfig};

/// Bindings installed unless controls are cleared: one pad on joystick 0.
pub const DEFAULT_KEYMAP: &[(&str, &str)] = &[
    ("J00:Axis0", "Joypad1 Axis Left/Right T=50%"),
    ("J00:Axis1", "Joypad1 Axis Up/Down T=50%"),
    ("J00:B0", "Joypad1 X"),
    ("J00:B1", "Joypad1 A"),
    ("J00:B2", "Joypad1 B"),
    ("J00:B3", "Joypad1 Y"),
    ("J00:B6", "Joypad1 L"),
    ("J00:B7", "Joypad1 R"),
    ("J00:B8", "Joypad1 Select"),
    ("J00:B11", "Joypad1 Start"),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostConfig {
    pub pacing: PacingConfig,
    pub rewind: RewindConfig,
    /// Skip [`DEFAULT_KEYMAP`] and install only `bindings`.
    pub clear_all_controls: bool,
    /// `(descriptor, command)` pairs applied after the defaults.
    pub bindings: Vec<(String, String)>,
    /// Stop after this many frames. Only honoured while the loop runs
    /// unthrottled (stream dumping).
    pub max_frames: Option<u64>,
}

impl HostConfig {
    /// The full binding list in installation order.
    pub fn keymap_entries(&self) -> Vec<(String, String)> {
        let defaults = if self.clear_all_controls {
            &[][..]
        } else {
            DEFAULT_KEYMAP
        };
        defaults
            .iter()
            .map(|&(input, command)| (input.to_owned(), command.to_owned()))
            .chain(self.bindings.iter().cloned())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pacing.validate()
    }
}

/// Splits a `DESCRIPTOR=COMMAND` binding at the first `=`.
pub fn parse_binding(text: &str) -> Result<(String, String), ConfigError> {
    let (input, command) = text
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedBinding(text.to_owned()))?;
    let (input, command) = (input.trim(), command.trim());
    if input.is_empty() || command.is_empty() {
        return Err(ConfigError::MalformedBinding(text.to_owned()));
    }
    Ok((input.to_owned(), command.to_owned()))
}
