use hostloop_core::{
    ParseError,
    input::{
        InputAddress, InputCodec, InputSyntax, JoystickInput, MAX_DEVICES, MAX_DISPLAY_ID,
        MAX_ELEMENT_INDEX, Modifiers, PSEUDO_POINTERS, decode, encode,
    },
};
use proptest::prelude::*;

fn modifiers_strategy() -> impl Strategy<Value = Modifiers> {
    prop_oneof![
        Just(Modifiers::X),
        any::<u8>().prop_map(|bits| Modifiers::from_bits_truncate(u16::from(bits))),
    ]
}

fn joystick_strategy() -> impl Strategy<Value = JoystickInput> {
    (0..MAX_DEVICES, modifiers_strategy(), 0..=MAX_ELEMENT_INDEX).prop_filter_map(
        "addressable joystick input",
        |(device, modifiers, index)| JoystickInput::new(device, modifiers, index),
    )
}

fn address_strategy() -> impl Strategy<Value = InputAddress> {
    prop_oneof![
        joystick_strategy().prop_map(InputAddress::Button),
        joystick_strategy().prop_map(InputAddress::Axis),
        any::<u8>().prop_map(InputAddress::PseudoButton),
        (0..PSEUDO_POINTERS).prop_map(InputAddress::PseudoPointer),
    ]
}

fn raw_address_strategy() -> impl Strategy<Value = InputAddress> {
    prop_oneof![
        address_strategy(),
        (0..=MAX_DISPLAY_ID).prop_map(InputAddress::Display),
    ]
}

/// `Win:<hex id>`, with ids taken verbatim from the descriptor.
struct WindowSystem;

impl InputSyntax for WindowSystem {
    fn parse(&self, descriptor: &str) -> Option<InputAddress> {
        let id = descriptor.strip_prefix("Win:")?;
        u32::from_str_radix(id, 16).ok().map(InputAddress::Display)
    }

    fn describe(&self, address: InputAddress) -> Option<String> {
        match address {
            InputAddress::Display(id) => Some(format!("Win:{id:x}")),
            _ => None,
        }
    }
}

/// Mostly well-formed descriptors, with enough slack to hit the error paths.
fn descriptor_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "J[0-9]{2}:(X\\+|(M[1-8]\\+){0,4})(B|Axis)[0-9]{1,5}",
        "J[0-9]{1,3}:(X\\+)?(M[0-9]\\+){0,2}(B|Axis|C)[0-9]{0,3}",
        "PseudoButton[0-9]{1,4}",
        "PseudoPointer[0-9]{1,2}",
        ".{0,12}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 512, .. ProptestConfig::default() })]

    #[test]
    fn decode_is_a_right_inverse_of_encode(address in address_strategy()) {
        let text = decode(address);
        prop_assert_eq!(encode(&text), Ok(address), "descriptor {}", text);
    }

    #[test]
    fn encoded_descriptors_are_stable_through_decode(text in descriptor_strategy()) {
        if let Ok(address) = encode(&text) {
            let canonical = decode(address);
            prop_assert_eq!(encode(&canonical), Ok(address), "{} -> {}", text, canonical);
        }
    }

    #[test]
    fn raw_form_round_trips(address in raw_address_strategy()) {
        prop_assert_eq!(InputAddress::from_raw(address.to_raw()), Some(address));
    }

    #[test]
    fn display_ids_never_alias_in_raw_form(id in any::<u32>()) {
        let codec = InputCodec::new().with_syntax(WindowSystem);
        let text = format!("Win:{id:x}");
        match codec.encode(&text) {
            Ok(address) => {
                prop_assert!(id <= MAX_DISPLAY_ID);
                prop_assert_eq!(address, InputAddress::Display(id));
                prop_assert_eq!(InputAddress::from_raw(address.to_raw()), Some(address));
                prop_assert_eq!(codec.decode(address), text);
            }
            Err(err) => {
                prop_assert!(id > MAX_DISPLAY_ID);
                prop_assert_eq!(err, ParseError::DisplayIdOutOfRange(id));
            }
        }
    }

    #[test]
    fn exclusive_never_shares_a_descriptor_with_meta(input in joystick_strategy()) {
        let text = decode(InputAddress::Button(input));
        prop_assert!(!(text.contains("X+") && text.contains('M')), "{}", text);
    }
}
