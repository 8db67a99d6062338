//! A stand-in emulation core: a few kilobytes of RAM that change a little
//! every frame, enough to exercise pacing and rewind without a real console.

use hostloop_core::{
    EmulationCore, InputValue, JoypadPorts, Snapshot, SnapshotError, VideoMode,
    input::CoreCommand,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::commands::{Axis, JoypadCommand, PADS};

const RAM_SIZE: usize = 8 * 1024;
const WRITES_PER_FRAME: usize = 16;

const UP: u16 = 0x0800;
const DOWN: u16 = 0x0400;
const LEFT: u16 = 0x0200;
const RIGHT: u16 = 0x0100;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Joypad(#[serde(with = "postcard::fixint::le")] u16);

/// Serialized machine state. Integers are fixed width so every snapshot has
/// the same length.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MachineState {
    #[serde(with = "postcard::fixint::le")]
    frame: u64,
    #[serde(with = "postcard::fixint::le")]
    rng: u64,
    joypads: [Joypad; PADS],
    ram: Vec<u8>,
}

pub struct DemoCore {
    state: MachineState,
    video_mode: VideoMode,
    rendered: u64,
}

impl DemoCore {
    pub fn new(video_mode: VideoMode) -> Self {
        Self {
            state: MachineState {
                frame: 0,
                rng: 0x9E37_79B9_7F4A_7C15,
                joypads: [Joypad::default(); PADS],
                ram: vec![0; RAM_SIZE],
            },
            video_mode,
            rendered: 0,
        }
    }

    /// Frame number of the emulated machine (moves backwards while rewinding).
    pub fn machine_frame(&self) -> u64 {
        self.state.frame
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64
        let mut x = self.state.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state.rng = x;
        x
    }

    fn apply_axis(&mut self, pad: usize, axis: Axis, threshold: u8, value: i16) {
        let (negative, positive) = match axis {
            Axis::LeftRight => (LEFT, RIGHT),
            Axis::UpDown => (UP, DOWN),
        };
        let limit = i32::from(i16::MAX) * i32::from(threshold) / 100;
        let value = i32::from(value);
        let word = &mut self.state.joypads[pad].0;
        *word &= !(negative | positive);
        if value <= -limit {
            *word |= negative;
        } else if value >= limit {
            *word |= positive;
        }
    }
}

impl JoypadPorts for DemoCore {
    fn joypad(&self, port: usize) -> u16 {
        self.state.joypads[port].0
    }

    fn set_joypad(&mut self, port: usize, state: u16) {
        self.state.joypads[port] = Joypad(state);
    }
}

impl Snapshot for DemoCore {
    fn capture(&self) -> Result<Vec<u8>, SnapshotError> {
        postcard::to_stdvec(&self.state).map_err(|err| SnapshotError(err.to_string()))
    }

    fn restore(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        self.state = postcard::from_bytes(bytes).map_err(|err| SnapshotError(err.to_string()))?;
        Ok(())
    }
}

impl EmulationCore for DemoCore {
    fn run_frame(&mut self, render: bool) {
        for _ in 0..WRITES_PER_FRAME {
            let r = self.next_random();
            let addr = (r >> 16) as usize % RAM_SIZE;
            self.state.ram[addr] = self.state.ram[addr].wrapping_add(r as u8 | 1);
        }
        // Player 1 input leaves a trace in RAM like a game would.
        self.state.ram[0] = (self.state.joypads[0].0 >> 8) as u8;
        self.state.frame += 1;
        if render {
            self.rendered += 1;
        }
    }

    fn video_mode(&self) -> VideoMode {
        self.video_mode
    }

    fn handle_command(&mut self, command: &CoreCommand, input: InputValue) {
        let Some(joypad) = JoypadCommand::from_id(command.id) else {
            trace!(command = %command.name, "not a joypad command");
            return;
        };
        match (joypad, input) {
            (JoypadCommand::Button { pad, mask }, InputValue::Button(pressed)) => {
                let word = &mut self.state.joypads[pad].0;
                if pressed {
                    *word |= mask;
                } else {
                    *word &= !mask;
                }
            }
            (
                JoypadCommand::Axis {
                    pad,
                    axis,
                    threshold,
                },
                InputValue::Axis(value),
            ) => self.apply_axis(pad, axis, threshold, value),
            _ => trace!(command = %command.name, ?input, "input kind does not fit command"),
        }
    }
}
