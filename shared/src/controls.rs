//! Player button state and its 5-byte wire encoding.

use crate::connection::Connection;
use crate::error::{FrameError, ProtocolError};
use crate::protocol::{encode_frame, MessageType, HEADER_LEN};
use log::warn;

/// Controls payload size: one byte per button.
pub const CONTROLS_PAYLOAD_LEN: usize = 5;

/// Largest press-count a single controls byte can carry.
pub const MAX_DOWNS: u8 = 0x7F;

const PRESSED_BIT: u8 = 0x80;

/// The five buttons, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    Left,
    Right,
    Up,
    Down,
    Jump,
}

impl ButtonKind {
    pub const ALL: [ButtonKind; 5] = [
        ButtonKind::Left,
        ButtonKind::Right,
        ButtonKind::Up,
        ButtonKind::Down,
        ButtonKind::Jump,
    ];
}

/// One button: whether it is held now and how often it went down since the
/// last flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Button {
    pub downs: u8,
    pub pressed: bool,
}

impl Button {
    fn to_byte(self) -> u8 {
        if self.downs > MAX_DOWNS {
            warn!(
                "button pressed {} times since last flush, sending {}",
                self.downs, MAX_DOWNS
            );
        }
        let pressed = if self.pressed { PRESSED_BIT } else { 0 };
        pressed | self.downs.min(MAX_DOWNS)
    }

    fn merge_byte(&mut self, byte: u8) {
        self.pressed = byte & PRESSED_BIT != 0;
        let total = u16::from(self.downs) + u16::from(byte & MAX_DOWNS);
        if total > u16::from(MAX_DOWNS) {
            warn!("got {} button downs in one flush, clamping to {}", total, MAX_DOWNS);
        }
        self.downs = total.min(u16::from(MAX_DOWNS)) as u8;
    }
}

/// Accumulated input for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub left: Button,
    pub right: Button,
    pub up: Button,
    pub down: Button,
    pub jump: Button,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn button(&self, kind: ButtonKind) -> &Button {
        match kind {
            ButtonKind::Left => &self.left,
            ButtonKind::Right => &self.right,
            ButtonKind::Up => &self.up,
            ButtonKind::Down => &self.down,
            ButtonKind::Jump => &self.jump,
        }
    }

    pub fn button_mut(&mut self, kind: ButtonKind) -> &mut Button {
        match kind {
            ButtonKind::Left => &mut self.left,
            ButtonKind::Right => &mut self.right,
            ButtonKind::Up => &mut self.up,
            ButtonKind::Down => &mut self.down,
            ButtonKind::Jump => &mut self.jump,
        }
    }

    /// Records a press event. Repeats of an already held button are ignored.
    pub fn press(&mut self, kind: ButtonKind) {
        let button = self.button_mut(kind);
        if !button.pressed {
            button.downs = button.downs.saturating_add(1);
            button.pressed = true;
        }
    }

    pub fn release(&mut self, kind: ButtonKind) {
        self.button_mut(kind).pressed = false;
    }

    pub fn reset_downs(&mut self) {
        for kind in ButtonKind::ALL {
            self.button_mut(kind).downs = 0;
        }
    }

    /// Encodes the five buttons; counts above 127 are clamped with a warning.
    pub fn encode(&self) -> [u8; CONTROLS_PAYLOAD_LEN] {
        ButtonKind::ALL.map(|kind| self.button(kind).to_byte())
    }

    /// Applies a controls payload: held flags are replaced, press-counts are
    /// added to the ones already accumulated.
    pub fn apply_payload(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if payload.len() != CONTROLS_PAYLOAD_LEN {
            return Err(ProtocolError::ControlsSize {
                size: payload.len(),
                expected: CONTROLS_PAYLOAD_LEN,
            });
        }
        for (kind, byte) in ButtonKind::ALL.into_iter().zip(payload) {
            self.button_mut(kind).merge_byte(*byte);
        }
        Ok(())
    }

    /// Queues a controls message on the connection's send buffer.
    pub fn send_controls_message(&self, connection: &mut Connection) -> Result<(), ProtocolError> {
        encode_frame(
            &mut connection.send_buffer,
            MessageType::Controls,
            &self.encode(),
        )
    }

    /// Reads one controls message from the front of the receive buffer.
    ///
    /// Returns `Ok(false)` when no complete controls message is buffered, and
    /// an error for a wrong-sized message (checked as soon as the header is
    /// in) or a message of another type.
    pub fn recv_controls_message(
        &mut self,
        connection: &mut Connection,
    ) -> Result<bool, ProtocolError> {
        let buf = &connection.recv_buffer;
        if buf.len() >= HEADER_LEN && buf[0] == MessageType::Controls.tag() {
            let size = crate::protocol::declared_len(buf);
            if size != CONTROLS_PAYLOAD_LEN {
                return Err(ProtocolError::ControlsSize {
                    size,
                    expected: CONTROLS_PAYLOAD_LEN,
                });
            }
        }

        let consumed = match connection.peek(MessageType::Controls) {
            Ok(frame) => {
                self.apply_payload(frame.payload)?;
                frame.frame_len()
            }
            Err(FrameError::NeedMoreData) => return Ok(false),
            Err(FrameError::UnexpectedType { found, .. }) => {
                return Err(ProtocolError::UnexpectedMessage { found })
            }
        };
        connection.consume(consumed);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_release() {
        let mut controls = Controls::new();
        controls.press(ButtonKind::Left);
        controls.press(ButtonKind::Left);
        assert_eq!(controls.left, Button { downs: 1, pressed: true });

        controls.release(ButtonKind::Left);
        controls.press(ButtonKind::Left);
        assert_eq!(controls.left, Button { downs: 2, pressed: true });

        controls.reset_downs();
        assert_eq!(controls.left, Button { downs: 0, pressed: true });
    }

    #[test]
    fn test_encode_bits() {
        let mut controls = Controls::new();
        controls.left = Button { downs: 3, pressed: true };
        controls.jump = Button { downs: 1, pressed: false };
        assert_eq!(controls.encode(), [0x83, 0, 0, 0, 0x01]);
    }

    #[test]
    fn test_encode_clamps_downs() {
        let mut controls = Controls::new();
        controls.up = Button { downs: 200, pressed: true };
        assert_eq!(controls.encode()[2], 0xFF);
        controls.up.pressed = false;
        assert_eq!(controls.encode()[2], 0x7F);
    }

    #[test]
    fn test_apply_payload_roundtrip() {
        let mut sent = Controls::new();
        sent.right = Button { downs: 5, pressed: true };
        sent.down = Button { downs: 127, pressed: false };

        let mut received = Controls::new();
        received.apply_payload(&sent.encode()).unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn test_apply_payload_accumulates_and_saturates() {
        let mut controls = Controls::new();
        controls.apply_payload(&[0x80 | 100, 0, 0, 0, 0]).unwrap();
        controls.apply_payload(&[100, 0, 0, 0, 0]).unwrap();
        assert_eq!(controls.left, Button { downs: 127, pressed: false });
    }

    #[test]
    fn test_apply_payload_wrong_size() {
        let mut controls = Controls::new();
        let err = controls.apply_payload(&[0; 4]).unwrap_err();
        assert_eq!(err, ProtocolError::ControlsSize { size: 4, expected: 5 });
    }

    #[test]
    fn test_send_and_receive_message() {
        let mut sent = Controls::new();
        sent.press(ButtonKind::Up);
        let mut client = Connection::new();
        sent.send_controls_message(&mut client).unwrap();
        assert_eq!(client.send_buffer, vec![1, 5, 0, 0, 0, 0, 0x81, 0, 0]);

        let mut server = Connection::new();
        server.receive(&client.take_outgoing());
        let mut received = Controls::new();
        assert!(received.recv_controls_message(&mut server).unwrap());
        assert_eq!(received, sent);
        assert!(server.recv_buffer.is_empty());
        assert!(!received.recv_controls_message(&mut server).unwrap());
    }

    #[test]
    fn test_receive_partial_message() {
        let mut server = Connection::new();
        server.receive(&[1, 5, 0, 0, 0x80]);
        let mut controls = Controls::new();
        assert!(!controls.recv_controls_message(&mut server).unwrap());
        assert_eq!(server.recv_buffer.len(), 5);

        server.receive(&[0, 0, 0, 0]);
        assert!(controls.recv_controls_message(&mut server).unwrap());
        assert!(controls.left.pressed);
    }

    #[test]
    fn test_receive_wrong_size_is_fatal_before_payload_arrives() {
        let mut server = Connection::new();
        server.receive(&[1, 6, 0, 0]);
        let mut controls = Controls::new();
        assert_eq!(
            controls.recv_controls_message(&mut server),
            Err(ProtocolError::ControlsSize { size: 6, expected: 5 })
        );
    }

    #[test]
    fn test_receive_other_type_is_fatal() {
        let mut server = Connection::new();
        server.receive(&[b's', 0, 0, 0]);
        let mut controls = Controls::new();
        assert_eq!(
            controls.recv_controls_message(&mut server),
            Err(ProtocolError::UnexpectedMessage { found: b's' })
        );
        assert_eq!(server.recv_buffer.len(), 4);
    }
}
