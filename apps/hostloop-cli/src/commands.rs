//! Command registry of the stand-in core: `Joypad<n> <button>` and analog
//! axis commands.

use hostloop_core::input::{Command, CommandResolver, CoreCommand};

pub const PADS: usize = 8;

/// Button names in joypad bit order (bit 15 first).
const BUTTONS: [&str; 12] = [
    "B", "Y", "Select", "Start", "Up", "Down", "Left", "Right", "A", "X", "L", "R",
];

const AXIS_FLAG: u32 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    LeftRight,
    UpDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoypadCommand {
    /// Sets or clears `mask` in the pad's button word.
    Button { pad: usize, mask: u16 },
    /// Presses one direction once the axis passes `threshold` percent.
    Axis { pad: usize, axis: Axis, threshold: u8 },
}

impl JoypadCommand {
    /// Packs the command into a [`CoreCommand`] id: `threshold << 16 | pad << 8 | kind`.
    fn id(self) -> u32 {
        match self {
            Self::Button { pad, mask } => {
                (pad as u32) << 8 | mask.leading_zeros()
            }
            Self::Axis {
                pad,
                axis,
                threshold,
            } => {
                let axis = match axis {
                    Axis::LeftRight => 0,
                    Axis::UpDown => 1,
                };
                u32::from(threshold) << 16 | (pad as u32) << 8 | AXIS_FLAG | axis
            }
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        let pad = ((id >> 8) & 0xFF) as usize;
        if pad >= PADS {
            return None;
        }
        let kind = id & 0xFF;
        if kind & AXIS_FLAG == 0 {
            let bit = kind as usize;
            return (bit < BUTTONS.len()).then(|| Self::Button {
                pad,
                mask: 0x8000 >> bit,
            });
        }
        let axis = match kind & !AXIS_FLAG {
            0 => Axis::LeftRight,
            1 => Axis::UpDown,
            _ => return None,
        };
        Some(Self::Axis {
            pad,
            axis,
            threshold: ((id >> 16) & 0xFF) as u8,
        })
    }

    fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix("Joypad")?;
        let (pad, name) = rest.split_once(' ')?;
        let pad: usize = pad.parse().ok().filter(|n| (1..=PADS).contains(n))?;
        let pad = pad - 1;

        if let Some(axis) = name.strip_prefix("Axis ") {
            let (axis, threshold) = axis.split_once(" T=")?;
            let axis = match axis {
                "Left/Right" => Axis::LeftRight,
                "Up/Down" => Axis::UpDown,
                _ => return None,
            };
            let threshold: u8 = threshold
                .strip_suffix('%')?
                .parse()
                .ok()
                .filter(|t| (1..=100).contains(t))?;
            return Some(Self::Axis {
                pad,
                axis,
                threshold,
            });
        }

        let bit = BUTTONS.iter().position(|&b| b == name)?;
        Some(Self::Button {
            pad,
            mask: 0x8000 >> bit,
        })
    }
}

/// Resolves the stand-in core's command names.
#[derive(Debug, Default, Clone, Copy)]
pub struct JoypadCommands;

impl CommandResolver for JoypadCommands {
    fn resolve(&self, text: &str) -> Option<Command> {
        let command = JoypadCommand::parse(text)?;
        Some(Command::Core(CoreCommand {
            id: command.id(),
            name: text.to_owned(),
        }))
    }
}
