//! Input binding: descriptor codec, command resolution and the binding table.

pub mod address;
pub mod command;
pub mod keymap;
pub mod syntax;

pub use address::{
    InputAddress, JoystickInput, MAX_DEVICES, MAX_DISPLAY_ID, MAX_ELEMENT_INDEX, Modifiers,
    PSEUDO_POINTERS, decode, encode,
};
pub use command::{Command, CommandChain, CommandResolver, CoreCommand, PortCommand, PortCommands};
pub use keymap::{Keymap, RebuildReport};
pub use syntax::{InputCodec, InputSyntax, JoystickSyntax};
