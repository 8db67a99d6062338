//! The active binding table consulted by the polling path.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{
    address::{InputAddress, JoystickInput, Modifiers},
    command::{Command, CommandChain},
    syntax::InputCodec,
};
use crate::error::BindingError;

/// Outcome of [`Keymap::rebuild`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Entries installed (an entry overwriting an earlier one still counts).
    pub bound: usize,
    /// Entries skipped, one error per entry, in input order.
    pub skipped: Vec<BindingError>,
}

#[derive(Debug, Default, Clone)]
pub struct Keymap {
    bindings: BTreeMap<InputAddress, Command>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the table and installs `entries` in order.
    ///
    /// Each entry is `(descriptor, command text)`. An entry whose command or
    /// descriptor does not resolve is reported and skipped; later entries for
    /// the same address overwrite earlier ones.
    pub fn rebuild<I, D, C>(
        &mut self,
        entries: I,
        codec: &InputCodec,
        commands: &CommandChain,
    ) -> RebuildReport
    where
        I: IntoIterator<Item = (D, C)>,
        D: AsRef<str>,
        C: AsRef<str>,
    {
        self.bindings.clear();
        let mut report = RebuildReport::default();

        for (descriptor, command) in entries {
            let (descriptor, command) = (descriptor.as_ref(), command.as_ref());
            match Self::resolve_entry(descriptor, command, codec, commands) {
                Ok((address, cmd)) => {
                    debug!(%address, command = %cmd, "bound input");
                    self.bindings.insert(address, cmd);
                    report.bound += 1;
                }
                Err(err) => {
                    warn!("{err}");
                    report.skipped.push(err);
                }
            }
        }

        report
    }

    fn resolve_entry(
        descriptor: &str,
        command: &str,
        codec: &InputCodec,
        commands: &CommandChain,
    ) -> Result<(InputAddress, Command), BindingError> {
        let cmd = commands
            .resolve(command)
            .ok_or_else(|| BindingError::UnknownCommand {
                descriptor: descriptor.to_owned(),
                command: command.to_owned(),
            })?;
        let address = codec
            .encode(descriptor)
            .map_err(|source| BindingError::Unmappable {
                descriptor: descriptor.to_owned(),
                command: command.to_owned(),
                source,
            })?;
        Ok((address, cmd))
    }

    /// The command bound to exactly `address`.
    pub fn resolve(&self, address: InputAddress) -> Option<&Command> {
        self.bindings.get(&address)
    }

    /// Resolves a joystick button press under the currently held modifiers.
    ///
    /// An `X+` binding for the button takes precedence, then a binding
    /// qualified with `held`, then the plain binding.
    pub fn lookup_button(
        &self,
        button: JoystickInput,
        held: Modifiers,
    ) -> Option<(InputAddress, &Command)> {
        let mut candidates = vec![button.with_modifiers(Modifiers::X)];
        if !held.is_empty() {
            candidates.push(button.with_modifiers(held - Modifiers::X));
        }
        candidates.push(button.with_modifiers(Modifiers::empty()));

        candidates.into_iter().find_map(|input| {
            let address = InputAddress::Button(input);
            self.resolve(address).map(|cmd| (address, cmd))
        })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InputAddress, &Command)> {
        self.bindings.iter().map(|(address, cmd)| (*address, cmd))
    }
}
