//! Error types shared by the host loop components.
//!
//! Nothing here is fatal to the process. Parse and binding errors are
//! reported and the offending entry skipped; snapshot errors drop a single
//! history entry.

use thiserror::Error;

/// A binding descriptor did not match the input grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized input descriptor prefix")]
    UnknownPrefix,

    #[error("device index must be exactly two decimal digits")]
    BadDeviceIndex,

    #[error("device index {0} is out of range (0-63)")]
    DeviceOutOfRange(u32),

    #[error("modifier tokens must be ascending M1+..M8+ without repeats")]
    BadModifiers,

    #[error("expected `Axis` or `B` after the device qualifiers")]
    MissingElementKind,

    #[error("element index must be a non-negative decimal integer")]
    BadElementIndex,

    #[error("element index {0} exceeds 0x3FFF")]
    ElementOutOfRange(u32),

    #[error("pseudo device index is malformed or out of range")]
    BadPseudoIndex,

    #[error("display input id {0:#x} does not fit in 29 bits")]
    DisplayIdOutOfRange(u32),

    #[error("no input syntax recognizes `{0}`")]
    Unrecognized(String),
}

/// An entry in a binding list could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("unrecognized command '{command}' (bound to '{descriptor}')")]
    UnknownCommand { descriptor: String, command: String },

    #[error("could not map '{command}' to '{descriptor}': {source}")]
    Unmappable {
        descriptor: String,
        command: String,
        #[source]
        source: ParseError,
    },
}

/// A core failed to capture or restore machine state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("snapshot failed: {0}")]
pub struct SnapshotError(pub String);

/// Invalid session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("frame time must be non-zero")]
    ZeroFrameTime,

    #[error("binding `{0}` is missing `=` between descriptor and command")]
    MalformedBinding(String),

    #[error("invalid frame skip `{0}` (expected `auto` or a frame count)")]
    InvalidFrameSkip(String),
}
