//! Bridges the wire-level `InputPacketHeader`/`InputType` framing to
//! the domain-level `riftcast_core::InputEvent` the rest of the app deals
//! in: converts between a capture/injection backend's event type and its
//! fixed-layout binary wire representation.

use bytes::{BufMut, Bytes, BytesMut};
use riftcast_core::{InputEvent, MouseButton};
use riftcast_wire::InputType;

/// Encodes one `InputEvent` to its fixed-length wire payload (5/2/4/4
/// bytes per `InputType::payload_len`).
pub fn encode_input_event(event: &InputEvent) -> (InputType, Bytes) {
    match *event {
        InputEvent::MouseMove { x, y } => {
            let mut buf = BytesMut::with_capacity(InputType::MouseMove.payload_len());
            buf.put_u16(normalize_to_u16(x));
            buf.put_u16(normalize_to_u16(y));
            buf.put_u8(0); // reserved
            (InputType::MouseMove, buf.freeze())
        }
        InputEvent::MouseButton { button, pressed } => {
            let mut buf = BytesMut::with_capacity(InputType::MouseButton.payload_len());
            buf.put_u8(button.tag());
            buf.put_u8(pressed as u8);
            (InputType::MouseButton, buf.freeze())
        }
        InputEvent::Key { keycode, pressed } => {
            let mut buf = BytesMut::with_capacity(InputType::Key.payload_len());
            buf.put_u16(keycode);
            buf.put_u8(pressed as u8);
            buf.put_u8(0); // reserved
            (InputType::Key, buf.freeze())
        }
        InputEvent::Scroll { delta_x, delta_y } => {
            let mut buf = BytesMut::with_capacity(InputType::Scroll.payload_len());
            buf.put_i16(delta_x);
            buf.put_i16(delta_y);
            (InputType::Scroll, buf.freeze())
        }
    }
}

/// Decodes a wire payload back to an `InputEvent`. Returns `None` if the
/// payload is shorter than `input_type`'s fixed length or carries an
/// unrecognized enum tag — the caller drops the packet.
pub fn decode_input_event(input_type: InputType, payload: &[u8]) -> Option<InputEvent> {
    if payload.len() < input_type.payload_len() {
        return None;
    }
    match input_type {
        InputType::MouseMove => {
            let x = u16::from_be_bytes([payload[0], payload[1]]);
            let y = u16::from_be_bytes([payload[2], payload[3]]);
            Some(InputEvent::MouseMove { x: denormalize_from_u16(x), y: denormalize_from_u16(y) })
        }
        InputType::MouseButton => {
            let button = MouseButton::from_tag(payload[0])?;
            Some(InputEvent::MouseButton { button, pressed: payload[1] != 0 })
        }
        InputType::Key => {
            let keycode = u16::from_be_bytes([payload[0], payload[1]]);
            Some(InputEvent::Key { keycode, pressed: payload[2] != 0 })
        }
        InputType::Scroll => {
            let delta_x = i16::from_be_bytes([payload[0], payload[1]]);
            let delta_y = i16::from_be_bytes([payload[2], payload[3]]);
            Some(InputEvent::Scroll { delta_x, delta_y })
        }
    }
}

fn normalize_to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}

fn denormalize_from_u16(v: u16) -> f32 {
    v as f32 / u16::MAX as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_move_round_trips_within_fixed_point_precision() {
        let event = InputEvent::MouseMove { x: 0.5, y: 0.25 };
        let (ty, payload) = encode_input_event(&event);
        let decoded = decode_input_event(ty, &payload).unwrap();
        match decoded {
            InputEvent::MouseMove { x, y } => {
                assert!((x - 0.5).abs() < 0.001);
                assert!((y - 0.25).abs() < 0.001);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mouse_button_round_trips() {
        let event = InputEvent::MouseButton { button: MouseButton::Right, pressed: true };
        let (ty, payload) = encode_input_event(&event);
        assert_eq!(decode_input_event(ty, &payload), Some(event));
    }

    #[test]
    fn key_round_trips() {
        let event = InputEvent::Key { keycode: 38, pressed: false };
        let (ty, payload) = encode_input_event(&event);
        assert_eq!(decode_input_event(ty, &payload), Some(event));
    }

    #[test]
    fn scroll_round_trips_negative_deltas() {
        let event = InputEvent::Scroll { delta_x: -3, delta_y: 7 };
        let (ty, payload) = encode_input_event(&event);
        assert_eq!(decode_input_event(ty, &payload), Some(event));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        assert_eq!(decode_input_event(InputType::Key, &[0, 1]), None);
    }
}
