//! Host-side control core for a console emulator: frame pacing, rewind
//! sequencing and the input binding table.
//!
//! The emulation core itself is external and reached through
//! [`runner::EmulationCore`]; the history buffer behind rewind is pluggable
//! through [`rewind::StateHistory`].

pub mod config;
pub mod error;
pub mod input;
pub mod pacing;
pub mod rewind;
pub mod runner;

pub use config::{DEFAULT_KEYMAP, HostConfig};
pub use error::{BindingError, ConfigError, ParseError, SnapshotError};
pub use pacing::{
    Clock, FrameClock, FrameDecision, PacingConfig, SkipPolicy, SpeedFlags, SystemClock, VideoMode,
};
pub use rewind::{JoypadPorts, RewindConfig, RewindController, RewindMode, Snapshot, StateHistory};
pub use runner::{EmulationCore, HostLoop, InputValue, StepOutcome};
