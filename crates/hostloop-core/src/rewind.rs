//! Rewind: periodic state capture and frame-by-frame replay.
//!
//! The controller only sequences push/pop on an external history buffer and
//! keeps the player's live joypad input across a replayed step. Entering and
//! leaving replay is decided elsewhere (a bound `Rewind` command).

use tracing::debug;

use crate::error::SnapshotError;

/// Controller ports whose joypad state survives a replayed step.
pub const JOYPAD_PORTS: usize = 8;

/// Live joypad state of the emulated machine.
pub trait JoypadPorts {
    fn joypad(&self, port: usize) -> u16;
    fn set_joypad(&mut self, port: usize, state: u16);
}

/// Full machine state as an opaque byte blob.
pub trait Snapshot {
    fn capture(&self) -> Result<Vec<u8>, SnapshotError>;
    fn restore(&mut self, bytes: &[u8]) -> Result<(), SnapshotError>;
}

/// Bounded history of machine states.
///
/// `push` never fails from the caller's point of view: a full buffer evicts
/// its oldest entries. `pop` restores the newest entry into `machine` and
/// reports whether more history remains.
pub trait StateHistory<M: ?Sized> {
    fn push(&mut self, machine: &M);
    fn pop(&mut self, machine: &mut M) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewindConfig {
    /// History buffer size in MiB. Zero disables rewind.
    pub buffer_mib: u32,
    /// Capture every Nth frame.
    pub granularity: u32,
}

impl RewindConfig {
    pub fn enabled(&self) -> bool {
        self.buffer_mib > 0
    }

    pub fn capacity_bytes(&self) -> usize {
        self.buffer_mib as usize * 1024 * 1024
    }
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            buffer_mib: 0,
            granularity: 1,
        }
    }
}

/// What a rewind tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindMode {
    Idle,
    Capturing,
    Replaying,
}

pub struct RewindController<H> {
    history: Option<H>,
    granularity: u64,
    replaying: bool,
}

impl<H> RewindController<H> {
    /// `history` of `None` makes the controller inert.
    pub fn new(history: Option<H>, granularity: u32) -> Self {
        Self {
            history,
            granularity: u64::from(granularity.max(1)),
            replaying: false,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, 1)
    }

    pub fn is_enabled(&self) -> bool {
        self.history.is_some()
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn history(&self) -> Option<&H> {
        self.history.as_ref()
    }

    /// Applies the "rewind held" signal. Ignored when no history is configured.
    pub fn set_replaying(&mut self, replaying: bool) {
        if self.history.is_none() || self.replaying == replaying {
            return;
        }
        debug!(replaying, "rewind state changed");
        self.replaying = replaying;
    }

    /// Runs before the emulated step of `frame`.
    pub fn tick<M>(&mut self, frame: u64, machine: &mut M) -> RewindMode
    where
        M: JoypadPorts + ?Sized,
        H: StateHistory<M>,
    {
        let Some(history) = self.history.as_mut() else {
            return RewindMode::Idle;
        };

        if self.replaying {
            // Live input wins over the input recorded in the restored state.
            let joypads: [u16; JOYPAD_PORTS] = std::array::from_fn(|port| machine.joypad(port));
            let more = history.pop(machine);
            for (port, state) in joypads.into_iter().enumerate() {
                machine.set_joypad(port, state);
            }

            if !more {
                debug!(frame, "rewind history exhausted");
                self.replaying = false;
                return RewindMode::Idle;
            }
            return RewindMode::Replaying;
        }

        if frame.is_multiple_of(self.granularity) {
            history.push(machine);
            return RewindMode::Capturing;
        }

        RewindMode::Idle
    }
}
