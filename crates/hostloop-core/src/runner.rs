//! The driving loop: sequences rewind, pacing and the emulated step, and
//! routes polled input through the active keymap.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    config::HostConfig,
    input::{
        Command, CommandChain, CoreCommand, InputAddress, InputCodec, JoystickInput, Keymap,
        Modifiers, PortCommand, RebuildReport,
    },
    pacing::{Clock, FrameClock, SpeedFlags, SystemClock, VideoMode},
    rewind::{JoypadPorts, RewindController, RewindMode, StateHistory},
};

/// Joysticks addressable by `JS<n>` port commands.
const META_JOYSTICKS: usize = 8;

/// The emulation core as seen from the host loop.
pub trait EmulationCore: JoypadPorts {
    /// Emulates one frame. `render` is false for frames the pacer skips.
    fn run_frame(&mut self, render: bool);

    fn video_mode(&self) -> VideoMode;

    /// A bound core command fired.
    fn handle_command(&mut self, command: &CoreCommand, input: InputValue);
}

/// The value carried by an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputValue {
    Button(bool),
    Axis(i16),
    Pointer { x: i16, y: i16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Ran { render: bool, rewind: RewindMode },
    Paused,
    /// The configured frame cap has been reached.
    Finished,
}

pub struct HostLoop<H, C: Clock = SystemClock> {
    frame_clock: FrameClock<C>,
    rewind: RewindController<H>,
    keymap: Keymap,
    speed: SpeedFlags,
    held_meta: [Modifiers; META_JOYSTICKS],
    toggled_meta: [Modifiers; META_JOYSTICKS],
    /// Address each held joystick button resolved to when it was pressed.
    pressed: HashMap<JoystickInput, InputAddress>,
    paused: bool,
    advance_pending: bool,
    frame: u64,
    /// Only enforced while unthrottled.
    max_frames: Option<u64>,
}

impl<H> HostLoop<H, SystemClock> {
    pub fn new(config: &HostConfig, history: Option<H>) -> Self {
        Self::with_clock(config, history, SystemClock)
    }
}

impl<H, C: Clock> HostLoop<H, C> {
    /// `history` is dropped when the configuration disables rewind.
    pub fn with_clock(config: &HostConfig, history: Option<H>, clock: C) -> Self {
        let history = history.filter(|_| config.rewind.enabled());
        Self {
            frame_clock: FrameClock::with_clock(config.pacing, clock),
            rewind: RewindController::new(history, config.rewind.granularity),
            keymap: Keymap::new(),
            speed: SpeedFlags::default(),
            held_meta: [Modifiers::empty(); META_JOYSTICKS],
            toggled_meta: [Modifiers::empty(); META_JOYSTICKS],
            pressed: HashMap::new(),
            paused: false,
            advance_pending: false,
            frame: 0,
            max_frames: config.max_frames,
        }
    }

    /// Replaces the keymap with the configuration's binding list.
    ///
    /// Buttons held across the rebuild lose their bindings, so modifiers
    /// they were holding are released too. Toggled modifiers persist.
    pub fn rebuild_keymap(
        &mut self,
        config: &HostConfig,
        codec: &InputCodec,
        commands: &CommandChain,
    ) -> RebuildReport {
        self.pressed.clear();
        self.held_meta = [Modifiers::empty(); META_JOYSTICKS];
        self.keymap
            .rebuild(config.keymap_entries(), codec, commands)
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn rewind(&self) -> &RewindController<H> {
        &self.rewind
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn speed(&self) -> SpeedFlags {
        self.speed
    }

    pub fn set_turbo(&mut self, turbo: bool) {
        self.speed.turbo = turbo;
    }

    pub fn set_sound_sync(&mut self, sound_sync: bool) {
        self.speed.sound_sync = sound_sync;
    }

    pub fn set_unthrottled(&mut self, unthrottled: bool) {
        self.speed.unthrottled = unthrottled;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused && !paused {
            self.frame_clock.reanchor();
        }
        self.paused = paused;
        self.advance_pending = false;
    }

    /// Runs one loop iteration.
    pub fn step<E>(&mut self, core: &mut E) -> StepOutcome
    where
        E: EmulationCore,
        H: StateHistory<E>,
    {
        if self.speed.unthrottled && self.max_frames.is_some_and(|max| self.frame >= max) {
            return StepOutcome::Finished;
        }

        if self.paused {
            if !std::mem::take(&mut self.advance_pending) {
                return StepOutcome::Paused;
            }
            core.run_frame(true);
            self.frame += 1;
            return StepOutcome::Ran {
                render: true,
                rewind: RewindMode::Idle,
            };
        }

        let rewind = self.rewind.tick(self.frame, core);
        self.speed.video_mode = core.video_mode();
        let decision = self.frame_clock.tick(&self.speed);
        core.run_frame(decision.render);
        self.frame += 1;

        StepOutcome::Ran {
            render: decision.render,
            rewind,
        }
    }

    /// A physical joystick button changed state.
    pub fn button<E: EmulationCore>(&mut self, core: &mut E, device: u8, index: u16, pressed: bool) {
        let Some(input) = JoystickInput::new(device, Modifiers::empty(), index) else {
            return;
        };

        let address = if pressed {
            let held = self.modifiers(device);
            let Some((address, _)) = self.keymap.lookup_button(input, held) else {
                return;
            };
            self.pressed.insert(input, address);
            address
        } else {
            // Release whatever the press resolved to, even if modifiers changed since.
            match self.pressed.remove(&input) {
                Some(address) => address,
                None => return,
            }
        };

        self.fire(core, address, InputValue::Button(pressed));
    }

    pub fn axis<E: EmulationCore>(&mut self, core: &mut E, device: u8, index: u16, value: i16) {
        if let Some(input) = JoystickInput::new(device, Modifiers::empty(), index) {
            self.fire(core, InputAddress::Axis(input), InputValue::Axis(value));
        }
    }

    pub fn pseudo_button<E: EmulationCore>(&mut self, core: &mut E, button: u8, pressed: bool) {
        self.fire(
            core,
            InputAddress::PseudoButton(button),
            InputValue::Button(pressed),
        );
    }

    pub fn pointer<E: EmulationCore>(&mut self, core: &mut E, slot: u8, x: i16, y: i16) {
        self.fire(
            core,
            InputAddress::PseudoPointer(slot),
            InputValue::Pointer { x, y },
        );
    }

    fn modifiers(&self, device: u8) -> Modifiers {
        let device = usize::from(device);
        if device >= META_JOYSTICKS {
            return Modifiers::empty();
        }
        self.held_meta[device] | self.toggled_meta[device]
    }

    fn fire<E: EmulationCore>(&mut self, core: &mut E, address: InputAddress, value: InputValue) {
        match self.keymap.resolve(address) {
            None => trace!(%address, "unbound input"),
            Some(Command::Core(cmd)) => core.handle_command(cmd, value),
            Some(&Command::Port(port)) => match value {
                InputValue::Button(pressed) => self.handle_port(port, pressed),
                _ => trace!(%address, %port, "port command ignores non-button input"),
            },
        }
    }

    fn handle_port(&mut self, command: PortCommand, pressed: bool) {
        match command {
            PortCommand::Rewind => self.rewind.set_replaying(pressed),
            PortCommand::Advance => {
                if pressed && self.paused {
                    self.advance_pending = true;
                }
            }
            PortCommand::Meta { joystick, modifier } => {
                if let (Some(held), Some(bit)) = (
                    self.held_meta.get_mut(usize::from(joystick)),
                    Modifiers::meta(modifier),
                ) {
                    held.set(bit, pressed);
                }
            }
            PortCommand::ToggleMeta { joystick, modifier } => {
                if pressed
                    && let (Some(toggled), Some(bit)) = (
                        self.toggled_meta.get_mut(usize::from(joystick)),
                        Modifiers::meta(modifier),
                    )
                {
                    toggled.toggle(bit);
                    debug!(joystick, modifier, "toggled modifier");
                }
            }
        }
    }
}
