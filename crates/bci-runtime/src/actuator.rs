//! Directional key output and the key-hold state machine.

use std::fmt;
use std::process::Command;

use bci_core::models::Action;
use tracing::{debug, info, warn};

// ── Direction ─────────────────────────────────────────────────────────────────

/// One of the two keys the controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

// ── Actuator ──────────────────────────────────────────────────────────────────

/// An input-injection surface with independent press and release per key.
///
/// Both operations are idempotent and cannot fail from the caller's point of
/// view; implementations log their own problems.
pub trait Actuator {
    fn press(&mut self, direction: Direction);
    fn release(&mut self, direction: Direction);
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn press(&mut self, direction: Direction) {
        (**self).press(direction)
    }

    fn release(&mut self, direction: Direction) {
        (**self).release(direction)
    }
}

impl<A: Actuator + ?Sized> Actuator for &mut A {
    fn press(&mut self, direction: Direction) {
        (**self).press(direction)
    }

    fn release(&mut self, direction: Direction) {
        (**self).release(direction)
    }
}

// ── KeyState ──────────────────────────────────────────────────────────────────

/// Which directional key is currently held. Holding both cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Released,
    LeftHeld,
    RightHeld,
}

impl KeyState {
    /// Drive the actuator for `action` and return the resulting state.
    ///
    /// The opposite key is released before the new one is pressed, so the
    /// actuator never sees both keys down. `REST` / `IDLE` release both
    /// regardless of the current state.
    pub fn apply<A: Actuator + ?Sized>(self, action: Action, actuator: &mut A) -> KeyState {
        match action {
            Action::Left => {
                actuator.release(Direction::Right);
                actuator.press(Direction::Left);
                KeyState::LeftHeld
            }
            Action::Right => {
                actuator.release(Direction::Left);
                actuator.press(Direction::Right);
                KeyState::RightHeld
            }
            Action::Rest | Action::Idle => Self::release_all(actuator),
        }
    }

    /// Release both keys.
    pub fn release_all<A: Actuator + ?Sized>(actuator: &mut A) -> KeyState {
        actuator.release(Direction::Right);
        actuator.release(Direction::Left);
        KeyState::Released
    }

    pub fn held(self) -> Option<Direction> {
        match self {
            KeyState::Released => None,
            KeyState::LeftHeld => Some(Direction::Left),
            KeyState::RightHeld => Some(Direction::Right),
        }
    }
}

// ── LogActuator ───────────────────────────────────────────────────────────────

/// Dry-run actuator that only logs.
#[derive(Debug, Default)]
pub struct LogActuator;

impl Actuator for LogActuator {
    fn press(&mut self, direction: Direction) {
        info!("press {}", direction);
    }

    fn release(&mut self, direction: Direction) {
        debug!("release {}", direction);
    }
}

// ── XdotoolActuator ───────────────────────────────────────────────────────────

/// Sends real arrow-key events to the focused window through `xdotool`.
#[derive(Debug, Clone)]
pub struct XdotoolActuator {
    program: String,
}

impl XdotoolActuator {
    pub fn new() -> Self {
        Self::with_program("xdotool")
    }

    /// Use a different executable with xdotool's `keydown KEY` / `keyup KEY` interface.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn key_name(direction: Direction) -> &'static str {
        match direction {
            Direction::Left => "Left",
            Direction::Right => "Right",
        }
    }

    fn send(&self, verb: &str, direction: Direction) {
        let key = Self::key_name(direction);
        match Command::new(&self.program).args([verb, key]).status() {
            Ok(status) if status.success() => debug!("{} {}", verb, key),
            Ok(status) => warn!("{} {} {} exited with {}", self.program, verb, key, status),
            Err(e) => warn!("Failed to run {} {} {}: {}", self.program, verb, key, e),
        }
    }
}

impl Default for XdotoolActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl Actuator for XdotoolActuator {
    fn press(&mut self, direction: Direction) {
        self.send("keydown", direction);
    }

    fn release(&mut self, direction: Direction) {
        self.send("keyup", direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Press(Direction),
        Release(Direction),
    }

    /// Records calls and tracks which keys are physically down.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        down: HashSet<Direction>,
    }

    impl Actuator for Recorder {
        fn press(&mut self, direction: Direction) {
            self.calls.push(Call::Press(direction));
            self.down.insert(direction);
            assert!(self.down.len() < 2, "both keys held after pressing {}", direction);
        }

        fn release(&mut self, direction: Direction) {
            self.calls.push(Call::Release(direction));
            self.down.remove(&direction);
        }
    }

    const ACTIONS: [Action; 4] = [Action::Rest, Action::Left, Action::Right, Action::Idle];

    #[test]
    fn test_left_releases_right_then_presses_left() {
        let mut rec = Recorder::default();
        let state = KeyState::Released.apply(Action::Left, &mut rec);
        assert_eq!(state, KeyState::LeftHeld);
        assert_eq!(
            rec.calls,
            vec![Call::Release(Direction::Right), Call::Press(Direction::Left)]
        );
    }

    #[test]
    fn test_right_releases_left_then_presses_right() {
        let mut rec = Recorder::default();
        let state = KeyState::Released.apply(Action::Right, &mut rec);
        assert_eq!(state, KeyState::RightHeld);
        assert_eq!(
            rec.calls,
            vec![Call::Release(Direction::Left), Call::Press(Direction::Right)]
        );
    }

    #[test]
    fn test_rest_and_idle_release_both() {
        for action in [Action::Rest, Action::Idle] {
            let mut rec = Recorder::default();
            let state = KeyState::LeftHeld.apply(action, &mut rec);
            assert_eq!(state, KeyState::Released);
            assert_eq!(
                rec.calls,
                vec![Call::Release(Direction::Right), Call::Release(Direction::Left)]
            );
        }
    }

    #[test]
    fn test_never_both_held_for_any_three_step_sequence() {
        for a in ACTIONS {
            for b in ACTIONS {
                for c in ACTIONS {
                    let mut rec = Recorder::default();
                    let mut state = KeyState::default();
                    for action in [a, b, c] {
                        state = state.apply(action, &mut rec);
                        let down: HashSet<Direction> = state.held().into_iter().collect();
                        assert_eq!(rec.down, down, "tracked keys diverged after {:?}", action);
                    }
                }
            }
        }
    }

    #[test]
    fn test_release_all_from_right() {
        let mut rec = Recorder::default();
        let state = KeyState::Released.apply(Action::Right, &mut rec);
        assert_eq!(state.held(), Some(Direction::Right));
        let state = KeyState::release_all(&mut rec);
        assert_eq!(state, KeyState::Released);
        assert!(rec.down.is_empty());
    }

    #[test]
    fn test_boxed_actuator_forwards() {
        let mut boxed: Box<dyn Actuator> = Box::new(LogActuator);
        let state = KeyState::Released.apply(Action::Left, &mut boxed);
        assert_eq!(state, KeyState::LeftHeld);
    }

    #[test]
    fn test_xdotool_missing_program_is_not_fatal() {
        let mut actuator = XdotoolActuator::with_program("/nonexistent/xdotool-for-tests");
        actuator.press(Direction::Left);
        actuator.release(Direction::Left);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Left.to_string(), "left");
        assert_eq!(Direction::Right.to_string(), "right");
        assert_eq!(XdotoolActuator::key_name(Direction::Right), "Right");
    }
}
