//! Bit-packed input addresses and their textual descriptors.
//!
//! Every bindable input source is identified by a 32-bit address. The
//! textual form is the binding format found in saved configurations, so
//! [`encode`] and [`decode`] must stay exact inverses.
//!
//! # Raw layout
//!
//! ```text
//! joystick   1 0 dddddd mmmmmmmm A X iiiiiiiiiiiiii
//!            | | device modifiers | | element index (0..=0x3FFF)
//!            | |                  | `- exclusive qualifier (`X+`)
//!            | `- always clear    `- axis discriminant
//!            `- joystick range
//! pseudo     0 1 ...kind (14 bits)... index (16 bits)
//! display    0 0 1 ...opaque id (29 bits)...
//! ```

use std::fmt;

use bitflags::bitflags;

use crate::error::ParseError;

const JOYSTICK_RANGE: u32 = 0x8000_0000;
const DEVICE_SHIFT: u32 = 24;
const DEVICE_MASK: u32 = 0x3F;
const MODIFIER_SHIFT: u32 = 16;
const AXIS_BIT: u32 = 0x8000;
const EXCLUSIVE_BIT: u32 = 0x4000;

const PSEUDO_RANGE: u32 = 0x4000_0000;
const PSEUDO_KIND_SHIFT: u32 = 16;
const PSEUDO_KIND_BUTTON: u32 = 0;
const PSEUDO_KIND_POINTER: u32 = 1;

const DISPLAY_RANGE: u32 = 0x2000_0000;
const DISPLAY_ID_MASK: u32 = 0x1FFF_FFFF;

/// Highest element index a joystick button or axis may carry.
pub const MAX_ELEMENT_INDEX: u16 = 0x3FFF;
/// Number of joystick devices addressable through `J<dd>:`.
pub const MAX_DEVICES: u8 = 64;
/// Highest id a display syntax may place in [`InputAddress::Display`].
pub const MAX_DISPLAY_ID: u32 = DISPLAY_ID_MASK;
/// Number of pseudo pointers (`PseudoPointer1`..`PseudoPointer8`).
pub const PSEUDO_POINTERS: u8 = 8;

bitflags! {
    /// Button-combo qualifiers attached to a joystick address.
    ///
    /// `X` is the exclusive qualifier written as `X+`. The encoder never
    /// produces it together with any `M` bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u16 {
        const M1 = 1 << 0;
        const M2 = 1 << 1;
        const M3 = 1 << 2;
        const M4 = 1 << 3;
        const M5 = 1 << 4;
        const M6 = 1 << 5;
        const M7 = 1 << 6;
        const M8 = 1 << 7;
        const X = 1 << 8;
    }
}

impl Modifiers {
    /// Returns the `M<k>` flag for `k` in `1..=8`.
    pub fn meta(k: u8) -> Option<Self> {
        match k {
            1..=8 => Self::from_bits(1 << (k - 1)),
            _ => None,
        }
    }

    fn meta_bits(self) -> u8 {
        (self.bits() & 0xFF) as u8
    }
}

/// One element (button or axis) of a physical joystick device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoystickInput {
    device: u8,
    modifiers: Modifiers,
    index: u16,
}

impl JoystickInput {
    /// Returns `None` when `device` or `index` is outside the addressable range.
    pub fn new(device: u8, modifiers: Modifiers, index: u16) -> Option<Self> {
        if device >= MAX_DEVICES || index > MAX_ELEMENT_INDEX {
            return None;
        }
        Some(Self {
            device,
            modifiers: canonical(modifiers),
            index,
        })
    }

    pub fn device(self) -> u8 {
        self.device
    }

    pub fn modifiers(self) -> Modifiers {
        self.modifiers
    }

    pub fn index(self) -> u16 {
        self.index
    }

    /// Same element with a different qualifier set.
    pub fn with_modifiers(self, modifiers: Modifiers) -> Self {
        Self {
            modifiers: canonical(modifiers),
            ..self
        }
    }

    fn to_raw(self) -> u32 {
        let mut raw = JOYSTICK_RANGE
            | (u32::from(self.device) & DEVICE_MASK) << DEVICE_SHIFT
            | u32::from(self.index & MAX_ELEMENT_INDEX);
        if self.modifiers.contains(Modifiers::X) {
            raw |= EXCLUSIVE_BIT;
        } else {
            raw |= u32::from(self.modifiers.meta_bits()) << MODIFIER_SHIFT;
        }
        raw
    }
}

/// A decoded input address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputAddress {
    Button(JoystickInput),
    Axis(JoystickInput),
    /// Pseudo pointer slot `0..8` (`PseudoPointer1` is slot 0).
    PseudoPointer(u8),
    /// Synthetic button `0..=255`.
    PseudoButton(u8),
    /// Opaque id claimed by a display-specific input syntax, at most
    /// [`MAX_DISPLAY_ID`]. [`InputCodec`](super::InputCodec) rejects larger ids.
    Display(u32),
}

impl InputAddress {
    /// Packs the address into its 32-bit form.
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Button(input) => input.to_raw(),
            Self::Axis(input) => input.to_raw() | AXIS_BIT,
            Self::PseudoButton(n) => {
                PSEUDO_RANGE | PSEUDO_KIND_BUTTON << PSEUDO_KIND_SHIFT | u32::from(n)
            }
            Self::PseudoPointer(slot) => {
                PSEUDO_RANGE
                    | PSEUDO_KIND_POINTER << PSEUDO_KIND_SHIFT
                    | u32::from(slot % PSEUDO_POINTERS)
            }
            Self::Display(id) => DISPLAY_RANGE | (id & DISPLAY_ID_MASK),
        }
    }

    /// Unpacks a 32-bit address. Values the encoder can never produce yield `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw & JOYSTICK_RANGE != 0 {
            if raw & PSEUDO_RANGE != 0 {
                return None;
            }
            let device = ((raw >> DEVICE_SHIFT) & DEVICE_MASK) as u8;
            let meta = ((raw >> MODIFIER_SHIFT) & 0xFF) as u16;
            let exclusive = raw & EXCLUSIVE_BIT != 0;
            if exclusive && meta != 0 {
                return None;
            }
            let modifiers = if exclusive {
                Modifiers::X
            } else {
                Modifiers::from_bits_truncate(meta)
            };
            let input = JoystickInput::new(
                device,
                modifiers,
                (raw & u32::from(MAX_ELEMENT_INDEX)) as u16,
            )?;
            return Some(if raw & AXIS_BIT != 0 {
                Self::Axis(input)
            } else {
                Self::Button(input)
            });
        }

        if raw & PSEUDO_RANGE != 0 {
            let kind = (raw & !PSEUDO_RANGE) >> PSEUDO_KIND_SHIFT;
            let index = raw & 0xFFFF;
            return match kind {
                PSEUDO_KIND_BUTTON if index <= 0xFF => Some(Self::PseudoButton(index as u8)),
                PSEUDO_KIND_POINTER if index < u32::from(PSEUDO_POINTERS) => {
                    Some(Self::PseudoPointer(index as u8))
                }
                _ => None,
            };
        }

        if raw & DISPLAY_RANGE != 0 {
            return Some(Self::Display(raw & DISPLAY_ID_MASK));
        }

        None
    }

    /// The joystick element, if this is a joystick button or axis.
    pub fn joystick(self) -> Option<JoystickInput> {
        match self {
            Self::Button(input) | Self::Axis(input) => Some(input),
            _ => None,
        }
    }
}

impl fmt::Display for InputAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Button(input) => {
                write_joystick_prefix(f, input)?;
                write!(f, "B{}", input.index)
            }
            Self::Axis(input) => {
                write_joystick_prefix(f, input)?;
                write!(f, "Axis{}", input.index)
            }
            Self::PseudoPointer(slot) => write!(f, "PseudoPointer{}", slot % PSEUDO_POINTERS + 1),
            Self::PseudoButton(n) => write!(f, "PseudoButton{n}"),
            Self::Display(id) => write!(f, "Display:{id:#010x}"),
        }
    }
}

fn write_joystick_prefix(f: &mut fmt::Formatter<'_>, input: JoystickInput) -> fmt::Result {
    write!(f, "J{:02}:", input.device)?;
    if input.modifiers.contains(Modifiers::X) {
        return f.write_str("X+");
    }
    for k in 1..=8u8 {
        if input.modifiers.meta_bits() & (1 << (k - 1)) != 0 {
            write!(f, "M{k}+")?;
        }
    }
    Ok(())
}

/// `X` stands alone: any `M` bits next to it are dropped.
fn canonical(modifiers: Modifiers) -> Modifiers {
    if modifiers.contains(Modifiers::X) {
        Modifiers::X
    } else {
        modifiers
    }
}

/// Parses a binding descriptor into an address.
///
/// Recognizes `PseudoPointer<1-8>`, `PseudoButton<0-255>` and
/// `J<dd>:[X+|M1+..M8+](Axis|B)<n>`. Anything else is an error; callers that
/// accept display-specific descriptors go through [`InputCodec`](super::InputCodec).
pub fn encode(descriptor: &str) -> Result<InputAddress, ParseError> {
    if let Some(rest) = descriptor.strip_prefix("PseudoPointer") {
        return match rest.as_bytes() {
            [digit @ b'1'..=b'8'] => Ok(InputAddress::PseudoPointer(digit - b'1')),
            _ => Err(ParseError::BadPseudoIndex),
        };
    }

    if let Some(rest) = descriptor.strip_prefix("PseudoButton") {
        let n = parse_decimal(rest).ok_or(ParseError::BadPseudoIndex)?;
        return u8::try_from(n)
            .map(InputAddress::PseudoButton)
            .map_err(|_| ParseError::BadPseudoIndex);
    }

    let rest = descriptor
        .strip_prefix('J')
        .ok_or(ParseError::UnknownPrefix)?;
    let (device, mut rest) = match rest.as_bytes() {
        [hi @ b'0'..=b'9', lo @ b'0'..=b'9', b':', ..] => {
            (u32::from(hi - b'0') * 10 + u32::from(lo - b'0'), &rest[3..])
        }
        _ => return Err(ParseError::BadDeviceIndex),
    };
    if device >= u32::from(MAX_DEVICES) {
        return Err(ParseError::DeviceOutOfRange(device));
    }

    let mut modifiers = Modifiers::empty();
    if let Some(after) = rest.strip_prefix("X+") {
        modifiers = Modifiers::X;
        rest = after;
    } else {
        // Tokens are only accepted in ascending order, one pass over M1..M8.
        for k in 1..=8u8 {
            if let [b'M', digit, b'+', ..] = rest.as_bytes()
                && *digit == b'0' + k
            {
                modifiers |= Modifiers::from_bits_truncate(1 << (k - 1));
                rest = &rest[3..];
            }
        }
    }
    if let [b'M', b'0'..=b'9', b'+', ..] = rest.as_bytes() {
        return Err(ParseError::BadModifiers);
    }

    let (axis, rest) = if let Some(after) = rest.strip_prefix("Axis") {
        (true, after)
    } else if let Some(after) = rest.strip_prefix('B') {
        (false, after)
    } else {
        return Err(ParseError::MissingElementKind);
    };

    let index = parse_decimal(rest).ok_or(ParseError::BadElementIndex)?;
    if index > u32::from(MAX_ELEMENT_INDEX) {
        return Err(ParseError::ElementOutOfRange(index));
    }

    let input = JoystickInput {
        device: device as u8,
        modifiers,
        index: index as u16,
    };
    Ok(if axis {
        InputAddress::Axis(input)
    } else {
        InputAddress::Button(input)
    })
}

/// Renders an address back into its descriptor.
pub fn decode(address: InputAddress) -> String {
    address.to_string()
}

/// Complete, unsigned base-10 integer. Empty or non-digit input is rejected.
fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.bytes().try_fold(0u32, |acc, b| {
        acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(device: u8, modifiers: Modifiers, index: u16) -> InputAddress {
        InputAddress::Button(JoystickInput::new(device, modifiers, index).expect("valid input"))
    }

    #[test]
    fn encodes_plain_button_and_axis() {
        assert_eq!(encode("J00:B11"), Ok(button(0, Modifiers::empty(), 11)));
        let axis = encode("J07:Axis3").expect("axis");
        assert_eq!(axis.to_raw(), 0x8000_0000 | 7 << 24 | 0x8000 | 3);
    }

    #[test]
    fn raw_layout_matches_saved_configs() {
        assert_eq!(encode("J00:B0").map(InputAddress::to_raw), Ok(0x8000_0000));
        assert_eq!(
            encode("J01:X+B6").map(InputAddress::to_raw),
            Ok(0x8100_0000 | 0x4000 | 6)
        );
        assert_eq!(
            encode("J00:M1+M3+B1").map(InputAddress::to_raw),
            Ok(0x8000_0000 | 0b101 << 16 | 1)
        );
    }

    #[test]
    fn stacked_modifiers_decode_in_order() {
        let addr = encode("J12:M2+M5+M8+Axis16383").expect("valid");
        assert_eq!(decode(addr), "J12:M2+M5+M8+Axis16383");
    }

    #[test]
    fn exclusive_qualifier_wins_over_meta_bits() {
        let input = JoystickInput::new(3, Modifiers::X | Modifiers::M4, 2).expect("valid");
        assert_eq!(decode(InputAddress::Button(input)), "J03:X+B2");
    }

    #[test]
    fn exclusive_inputs_equal_their_round_trip() {
        let input = JoystickInput::new(3, Modifiers::X | Modifiers::M4, 2).expect("valid");
        assert_eq!(input.modifiers(), Modifiers::X);
        assert_eq!(encode("J03:X+B2"), Ok(InputAddress::Button(input)));

        let plain = JoystickInput::new(3, Modifiers::empty(), 2).expect("valid");
        let widened = plain.with_modifiers(Modifiers::M1 | Modifiers::X);
        assert_eq!(widened, input);
        assert_eq!(
            InputAddress::from_raw(InputAddress::Button(widened).to_raw()),
            Some(InputAddress::Button(input))
        );
    }

    #[test]
    fn rejects_bad_device_index() {
        assert_eq!(encode("J0:B1"), Err(ParseError::BadDeviceIndex));
        assert_eq!(encode("J000:B1"), Err(ParseError::BadDeviceIndex));
        assert_eq!(encode("Jab:B1"), Err(ParseError::BadDeviceIndex));
        assert_eq!(encode("J64:B1"), Err(ParseError::DeviceOutOfRange(64)));
        assert!(encode("J63:B1").is_ok());
    }

    #[test]
    fn rejects_bad_element_index() {
        assert_eq!(encode("J00:B16384"), Err(ParseError::ElementOutOfRange(16384)));
        assert_eq!(encode("J00:B"), Err(ParseError::BadElementIndex));
        assert_eq!(encode("J00:B-1"), Err(ParseError::BadElementIndex));
        assert_eq!(encode("J00:B1x"), Err(ParseError::BadElementIndex));
        assert_eq!(encode("J00:B 1"), Err(ParseError::BadElementIndex));
        assert_eq!(encode("J00:Axis99999999999"), Err(ParseError::BadElementIndex));
        assert_eq!(encode("J00:C1"), Err(ParseError::MissingElementKind));
    }

    #[test]
    fn rejects_out_of_order_modifiers() {
        assert_eq!(encode("J00:M2+M1+B0"), Err(ParseError::BadModifiers));
        assert_eq!(encode("J00:M1+M1+B0"), Err(ParseError::BadModifiers));
        assert_eq!(encode("J00:M9+B0"), Err(ParseError::BadModifiers));
        assert_eq!(encode("J00:X+M1+B0"), Err(ParseError::BadModifiers));
    }

    #[test]
    fn pseudo_buttons_cover_full_byte_range() {
        for n in 0..=255u8 {
            let text = format!("PseudoButton{n}");
            let addr = encode(&text).expect("in range");
            assert_eq!(addr, InputAddress::PseudoButton(n));
            assert_eq!(decode(addr), text);
        }
        assert_eq!(encode("PseudoButton256"), Err(ParseError::BadPseudoIndex));
        assert_eq!(encode("PseudoButton999"), Err(ParseError::BadPseudoIndex));
        assert_eq!(encode("PseudoButton"), Err(ParseError::BadPseudoIndex));
        assert_eq!(encode("PseudoButton+1"), Err(ParseError::BadPseudoIndex));
    }

    #[test]
    fn pseudo_pointers_are_one_based() {
        assert_eq!(encode("PseudoPointer1"), Ok(InputAddress::PseudoPointer(0)));
        assert_eq!(encode("PseudoPointer8"), Ok(InputAddress::PseudoPointer(7)));
        assert_eq!(decode(InputAddress::PseudoPointer(7)), "PseudoPointer8");
        assert_eq!(encode("PseudoPointer0"), Err(ParseError::BadPseudoIndex));
        assert_eq!(encode("PseudoPointer9"), Err(ParseError::BadPseudoIndex));
        assert_eq!(encode("PseudoPointer12"), Err(ParseError::BadPseudoIndex));
    }

    #[test]
    fn pseudo_ranges_do_not_overlap_joysticks() {
        let pointer = InputAddress::PseudoPointer(0).to_raw();
        let button = InputAddress::PseudoButton(0).to_raw();
        assert_ne!(pointer, button);
        assert_eq!(pointer & 0x8000_0000, 0);
        assert_eq!(InputAddress::from_raw(pointer), Some(InputAddress::PseudoPointer(0)));
        assert_eq!(InputAddress::from_raw(button), Some(InputAddress::PseudoButton(0)));
    }

    #[test]
    fn from_raw_rejects_unproducible_values() {
        assert_eq!(InputAddress::from_raw(0), None);
        assert_eq!(InputAddress::from_raw(0xC000_0000), None);
        assert_eq!(InputAddress::from_raw(0x8001_4000), None);
        assert_eq!(InputAddress::from_raw(0x4000_0100), None);
        assert_eq!(InputAddress::from_raw(0x4001_0008), None);
    }
}
