/// Keyboard input.
///
/// Tracks which keys are currently held down, enabling:
///   - One action per fresh key press
///   - Walk-on-hold: a held direction re-submits once the turn is idle
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// ## Bindings
///   Arrows / WASD   move        Z / U   undo        R   restart
///   Enter / Space   confirm     Esc     back        PgUp / PgDn   page the level list

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::Dir;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// What a key or button asks the game to do.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Intent {
    Move(Dir),
    Undo,
    Restart,
    Confirm,
    Back,
    PageUp,
    PageDown,
}

pub fn intent_for(code: KeyCode) -> Option<Intent> {
    let intent = match code {
        KeyCode::Up => Intent::Move(Dir::Up),
        KeyCode::Down => Intent::Move(Dir::Down),
        KeyCode::Left => Intent::Move(Dir::Left),
        KeyCode::Right => Intent::Move(Dir::Right),
        KeyCode::Enter => Intent::Confirm,
        KeyCode::Esc => Intent::Back,
        KeyCode::PageUp => Intent::PageUp,
        KeyCode::PageDown => Intent::PageDown,
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'w' => Intent::Move(Dir::Up),
            's' => Intent::Move(Dir::Down),
            'a' => Intent::Move(Dir::Left),
            'd' => Intent::Move(Dir::Right),
            'z' | 'u' => Intent::Undo,
            'r' => Intent::Restart,
            ' ' => Intent::Confirm,
            _ => return None,
        },
        _ => return None,
    };
    Some(intent)
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.raw_events.push(key);
                self.apply_key(key, Instant::now());
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn apply_key(&mut self, key: KeyEvent, now: Instant) {
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    /// Intents from keys pressed this frame, in press order.
    pub fn intents(&self) -> Vec<Intent> {
        self.fresh_presses.iter().filter_map(|&c| intent_for(c)).collect()
    }

    /// Direction of a movement key that is still held, for walk-on-hold.
    pub fn held_dir(&self) -> Option<Dir> {
        self.last_active.keys().find_map(|&c| match intent_for(c) {
            Some(Intent::Move(dir)) if self.is_held(c) => Some(dir),
            _ => None,
        })
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn bindings() {
        assert_eq!(intent_for(KeyCode::Char('W')), Some(Intent::Move(Dir::Up)));
        assert_eq!(intent_for(KeyCode::Char('d')), Some(Intent::Move(Dir::Right)));
        assert_eq!(intent_for(KeyCode::Left), Some(Intent::Move(Dir::Left)));
        assert_eq!(intent_for(KeyCode::Char('z')), Some(Intent::Undo));
        assert_eq!(intent_for(KeyCode::Char('U')), Some(Intent::Undo));
        assert_eq!(intent_for(KeyCode::Char('r')), Some(Intent::Restart));
        assert_eq!(intent_for(KeyCode::Enter), Some(Intent::Confirm));
        assert_eq!(intent_for(KeyCode::Esc), Some(Intent::Back));
        assert_eq!(intent_for(KeyCode::Char('q')), None);
    }

    #[test]
    fn repeat_events_are_not_fresh() {
        let mut input = InputState::new();
        let now = Instant::now();
        input.apply_key(press(KeyCode::Right), now);
        input.apply_key(press(KeyCode::Right), now);
        input.apply_key(press(KeyCode::Char('z')), now);
        assert_eq!(input.intents(), vec![Intent::Move(Dir::Right), Intent::Undo]);
        assert_eq!(input.held_dir(), Some(Dir::Right));
    }

    #[test]
    fn release_clears_hold_when_honored() {
        let mut input = InputState::new();
        input.honor_release = true;
        let now = Instant::now();
        input.apply_key(press(KeyCode::Up), now);
        let mut release = press(KeyCode::Up);
        release.kind = KeyEventKind::Release;
        input.apply_key(release, now);
        assert_eq!(input.held_dir(), None);
    }
}
