//! Ordered chain of input syntaxes.
//!
//! The built-in joystick/pseudo-device grammar does not own the whole
//! descriptor vocabulary. Frontends register display-specific syntaxes
//! (keyboard, mouse, ...) behind it; each syntax either claims a descriptor
//! or declines it and the next one is tried.

use tracing::trace;

use super::address::{self, InputAddress, MAX_DISPLAY_ID};
use crate::error::ParseError;

/// One input vocabulary in the chain.
pub trait InputSyntax {
    /// Parses `descriptor`, or returns `None` when it is not this syntax's.
    fn parse(&self, descriptor: &str) -> Option<InputAddress>;

    /// Renders `address`, or returns `None` when it was not produced by this syntax.
    fn describe(&self, address: InputAddress) -> Option<String>;
}

/// `PseudoPointer<n>`, `PseudoButton<n>` and `J<dd>:...` descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct JoystickSyntax;

impl InputSyntax for JoystickSyntax {
    fn parse(&self, descriptor: &str) -> Option<InputAddress> {
        match address::encode(descriptor) {
            Ok(addr) => Some(addr),
            Err(err) => {
                trace!(descriptor, %err, "joystick syntax declined descriptor");
                None
            }
        }
    }

    fn describe(&self, address: InputAddress) -> Option<String> {
        match address {
            InputAddress::Display(_) => None,
            _ => Some(address::decode(address)),
        }
    }
}

/// The full descriptor codec: built-in grammar first, then registered delegates.
pub struct InputCodec {
    syntaxes: Vec<Box<dyn InputSyntax + Send + Sync>>,
}

impl InputCodec {
    /// A codec that only understands the built-in grammar.
    pub fn new() -> Self {
        Self {
            syntaxes: vec![Box::new(JoystickSyntax)],
        }
    }

    /// Appends a delegate tried after every syntax already registered.
    pub fn with_syntax(mut self, syntax: impl InputSyntax + Send + Sync + 'static) -> Self {
        self.syntaxes.push(Box::new(syntax));
        self
    }

    pub fn encode(&self, descriptor: &str) -> Result<InputAddress, ParseError> {
        let address = self
            .syntaxes
            .iter()
            .find_map(|syntax| syntax.parse(descriptor))
            .ok_or_else(|| ParseError::Unrecognized(descriptor.to_owned()))?;
        match address {
            // Wider ids would alias another address once packed.
            InputAddress::Display(id) if id > MAX_DISPLAY_ID => {
                Err(ParseError::DisplayIdOutOfRange(id))
            }
            _ => Ok(address),
        }
    }

    pub fn decode(&self, address: InputAddress) -> String {
        self.syntaxes
            .iter()
            .find_map(|syntax| syntax.describe(address))
            .unwrap_or_else(|| address::decode(address))
    }
}

impl Default for InputCodec {
    fn default() -> Self {
        Self::new()
    }
}
