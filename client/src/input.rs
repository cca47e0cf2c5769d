//! Client input management: button edges in, controls messages out

use log::debug;
use shared::{ButtonKind, Connection, Controls, Direction, ProtocolError};

/// Collects button events between flushes and turns them into controls messages
///
/// Press counts accumulate until [`InputManager::flush`] sends them; held
/// flags always reflect the latest state.
#[derive(Debug, Default)]
pub struct InputManager {
    controls: Controls,
    flushes: u64,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, kind: ButtonKind) {
        self.controls.press(kind);
    }

    pub fn release(&mut self, kind: ButtonKind) {
        self.controls.release(kind);
    }

    /// Sets the held state of a button, raising press/release only on edges
    pub fn set_held(&mut self, kind: ButtonKind, held: bool) {
        match (held, self.controls.button(kind).pressed) {
            (true, false) => self.press(kind),
            (false, true) => self.release(kind),
            _ => {}
        }
    }

    /// Holds the button for `direction` and releases the other three
    pub fn steer(&mut self, direction: Option<Direction>) {
        let wanted = direction.map(button_for);
        for kind in [ButtonKind::Left, ButtonKind::Right, ButtonKind::Up, ButtonKind::Down] {
            self.set_held(kind, Some(kind) == wanted);
        }
    }

    /// Returns the current input state
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Queues a controls message and starts a new press-count window
    pub fn flush(&mut self, connection: &mut Connection) -> Result<(), ProtocolError> {
        self.controls.send_controls_message(connection)?;
        self.controls.reset_downs();
        self.flushes += 1;
        debug!("Controls flush {}: {:?}", self.flushes, self.controls.encode());
        Ok(())
    }
}

/// Button that turns a player towards `direction`
pub fn button_for(direction: Direction) -> ButtonKind {
    match direction {
        Direction::Left => ButtonKind::Left,
        Direction::Right => ButtonKind::Right,
        Direction::Up => ButtonKind::Up,
        Direction::Down => ButtonKind::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MessageType;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert_eq!(*input_manager.controls(), Controls::default());
        assert_eq!(input_manager.flushes(), 0);
    }

    #[test]
    fn test_set_held_only_counts_edges() {
        let mut input = InputManager::new();
        input.set_held(ButtonKind::Up, true);
        input.set_held(ButtonKind::Up, true);
        assert_eq!(input.controls().up.downs, 1);

        input.set_held(ButtonKind::Up, false);
        input.set_held(ButtonKind::Up, true);
        assert_eq!(input.controls().up.downs, 2);
        assert!(input.controls().up.pressed);
    }

    #[test]
    fn test_steer_releases_other_directions() {
        let mut input = InputManager::new();
        input.steer(Some(Direction::Left));
        input.steer(Some(Direction::Down));
        assert!(!input.controls().left.pressed);
        assert!(input.controls().down.pressed);
        assert_eq!(input.controls().left.downs, 1);

        input.steer(None);
        assert!(!input.controls().down.pressed);
    }

    #[test]
    fn test_flush_sends_and_resets_downs() {
        let mut input = InputManager::new();
        let mut conn = Connection::new();
        input.press(ButtonKind::Right);
        input.press(ButtonKind::Jump);
        input.release(ButtonKind::Jump);

        input.flush(&mut conn).unwrap();
        assert_eq!(
            conn.send_buffer,
            vec![MessageType::Controls.tag(), 5, 0, 0, 0, 0x81, 0, 0, 1]
        );
        assert_eq!(input.controls().right.downs, 0);
        assert!(input.controls().right.pressed);
        assert_eq!(input.flushes(), 1);

        conn.send_buffer.clear();
        input.flush(&mut conn).unwrap();
        assert_eq!(conn.send_buffer[4..], [0, 0x80, 0, 0, 0]);
    }
}
