//! Per-connection byte queues.
//!
//! The transport owns the socket; the core only sees a [`Connection`] with an
//! outgoing and an incoming byte sequence. Each connection parses its own
//! receive buffer, so there is no shared parse state between peers.

use crate::error::FrameError;
use crate::protocol::{peek_frame, Frame, MessageType};

/// Notifications raised by the transport for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    DataArrived(Vec<u8>),
    Closed,
}

/// Send and receive buffers for one peer.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    pub send_buffer: Vec<u8>,
    pub recv_buffer: Vec<u8>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes delivered by the transport.
    pub fn receive(&mut self, bytes: &[u8]) {
        self.recv_buffer.extend_from_slice(bytes);
    }

    /// Looks for a complete message of type `expected` at the front of the
    /// receive buffer without consuming it.
    pub fn peek(&self, expected: MessageType) -> Result<Frame<'_>, FrameError> {
        peek_frame(&self.recv_buffer, expected)
    }

    /// Drops `len` bytes from the front of the receive buffer.
    pub fn consume(&mut self, len: usize) {
        let len = len.min(self.recv_buffer.len());
        self.recv_buffer.drain(..len);
    }

    /// Hands the queued outgoing bytes to the transport.
    pub fn take_outgoing(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.send_buffer)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.send_buffer.is_empty()
    }

    /// Discards everything buffered, e.g. after the peer went away.
    pub fn reset(&mut self) {
        self.send_buffer.clear();
        self.recv_buffer.clear();
    }

    /// Updates the buffers for a transport notification. A fresh or closed
    /// connection starts from empty buffers; a partial message left over
    /// from a closed stream is dropped.
    pub fn apply_event(&mut self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Opened | ConnectionEvent::Closed => self.reset(),
            ConnectionEvent::DataArrived(bytes) => self.receive(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;

    #[test]
    fn test_receive_and_consume() {
        let mut conn = Connection::new();
        conn.receive(&[1, 2, 3]);
        conn.receive(&[4]);
        assert_eq!(conn.recv_buffer, vec![1, 2, 3, 4]);

        conn.consume(3);
        assert_eq!(conn.recv_buffer, vec![4]);

        conn.consume(10);
        assert!(conn.recv_buffer.is_empty());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut conn = Connection::new();
        encode_frame(&mut conn.recv_buffer, MessageType::State, &[7]).unwrap();

        let len = conn.peek(MessageType::State).unwrap().frame_len();
        assert_eq!(conn.recv_buffer.len(), len);
        assert_eq!(
            conn.peek(MessageType::Controls),
            Err(FrameError::UnexpectedType {
                found: b's',
                expected: MessageType::Controls
            })
        );
    }

    #[test]
    fn test_take_outgoing() {
        let mut conn = Connection::new();
        assert!(!conn.has_outgoing());
        conn.send_buffer.extend_from_slice(&[1, 2]);
        assert!(conn.has_outgoing());
        assert_eq!(conn.take_outgoing(), vec![1, 2]);
        assert!(!conn.has_outgoing());
    }

    #[test]
    fn test_apply_event() {
        let mut conn = Connection::new();
        conn.apply_event(&ConnectionEvent::Opened);
        conn.apply_event(&ConnectionEvent::DataArrived(vec![1, 5]));
        conn.apply_event(&ConnectionEvent::DataArrived(vec![0]));
        assert_eq!(conn.recv_buffer, vec![1, 5, 0]);
        assert_eq!(conn.peek(MessageType::Controls), Err(FrameError::NeedMoreData));

        conn.apply_event(&ConnectionEvent::Closed);
        assert!(conn.recv_buffer.is_empty());
    }

    #[test]
    fn test_reset_discards_partial_data() {
        let mut conn = Connection::new();
        conn.receive(&[1, 5, 0]);
        conn.send_buffer.push(9);
        conn.reset();
        assert!(conn.recv_buffer.is_empty());
        assert!(conn.send_buffer.is_empty());
    }
}
