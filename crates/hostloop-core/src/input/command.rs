//! Commands that bindings point at, and the resolvers that name them.

use std::fmt;

/// Host-level commands handled by the loop itself rather than the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortCommand {
    /// Holds modifier `M<modifier>` on `joystick` while pressed.
    Meta { joystick: u8, modifier: u8 },
    /// Flips modifier `M<modifier>` on `joystick` on every press.
    ToggleMeta { joystick: u8, modifier: u8 },
    /// The "rewind held" signal.
    Rewind,
    /// Single-frame advance while paused.
    Advance,
}

/// An opaque command owned by the emulation core's registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoreCommand {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Port(PortCommand),
    Core(CoreCommand),
}

impl fmt::Display for PortCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Meta { joystick, modifier } => write!(f, "JS{} Meta{modifier}", joystick + 1),
            Self::ToggleMeta { joystick, modifier } => {
                write!(f, "JS{} ToggleMeta{modifier}", joystick + 1)
            }
            Self::Rewind => f.write_str("Rewind"),
            Self::Advance => f.write_str("Advance"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(cmd) => fmt::Display::fmt(cmd, f),
            Self::Core(cmd) => f.write_str(&cmd.name),
        }
    }
}

/// Resolves command text to a [`Command`]; `None` means "not mine".
pub trait CommandResolver {
    fn resolve(&self, text: &str) -> Option<Command>;
}

/// `JS<n> Meta<k>`, `JS<n> ToggleMeta<k>`, `Rewind` and `Advance`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortCommands;

impl CommandResolver for PortCommands {
    fn resolve(&self, text: &str) -> Option<Command> {
        let port = match text {
            "Rewind" => PortCommand::Rewind,
            "Advance" => PortCommand::Advance,
            _ => {
                let rest = text.strip_prefix("JS")?;
                let (joystick, rest) = match rest.as_bytes() {
                    [n @ b'1'..=b'8', ..] => (n - b'1', &rest[1..]),
                    _ => return None,
                };
                if let Some(k) = rest.strip_prefix(" Meta") {
                    PortCommand::Meta {
                        joystick,
                        modifier: single_digit_1_to_8(k)?,
                    }
                } else if let Some(k) = rest.strip_prefix(" ToggleMeta") {
                    PortCommand::ToggleMeta {
                        joystick,
                        modifier: single_digit_1_to_8(k)?,
                    }
                } else {
                    return None;
                }
            }
        };
        Some(Command::Port(port))
    }
}

fn single_digit_1_to_8(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [d @ b'1'..=b'8'] => Some(d - b'0'),
        _ => None,
    }
}

/// Port commands first, then each registered resolver in order.
pub struct CommandChain {
    resolvers: Vec<Box<dyn CommandResolver + Send + Sync>>,
}

impl CommandChain {
    pub fn new() -> Self {
        Self {
            resolvers: vec![Box::new(PortCommands)],
        }
    }

    pub fn with_resolver(mut self, resolver: impl CommandResolver + Send + Sync + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn resolve(&self, text: &str) -> Option<Command> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(text))
    }
}

impl Default for CommandChain {
    fn default() -> Self {
        Self::new()
    }
}
