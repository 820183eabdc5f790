/// Keyboard state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement while a key is held (diagonals included)
///   - Edge-triggered actions (reward choices, confirm, pause)
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// Key map:
///   Arrows / WASD → move     Z → Reward A     X → Reward B
///   Enter / Space → confirm  F1 / P → pause   Esc / Q / Ctrl-C → quit

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{Action, InputSnapshot};
use crate::domain::geometry::Vec2;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const UP: [KeyCode; 3] = [KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const DOWN: [KeyCode; 3] = [KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const LEFT: [KeyCode; 3] = [KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const RIGHT: [KeyCode; 3] = [KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];

/// Requests handled by the main loop rather than the simulation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Meta {
    Pause,
    Quit,
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// `drain_events()` call.
    fresh_presses: Vec<KeyCode>,

    raw_events: Vec<KeyEvent>,

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
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            self.record(key, Instant::now());
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record(&mut self, key: KeyEvent, at: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            // Without enhancement, releases are guessed from the timeout
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, at);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// The simulation's view of the keyboard this frame.
    pub fn snapshot(&self) -> InputSnapshot {
        let axis = |neg: bool, pos: bool| match (neg, pos) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let movement = Vec2::new(
            axis(self.any_held(&LEFT), self.any_held(&RIGHT)),
            axis(self.any_held(&UP), self.any_held(&DOWN)),
        );

        let mut snap = InputSnapshot { movement, ..InputSnapshot::default() };
        if self.any_pressed(&[KeyCode::Char('z'), KeyCode::Char('Z')]) {
            snap.actions.insert(Action::RewardA);
        }
        if self.any_pressed(&[KeyCode::Char('x'), KeyCode::Char('X')]) {
            snap.actions.insert(Action::RewardB);
        }
        if self.any_pressed(&[KeyCode::Enter, KeyCode::Char(' ')]) {
            snap.actions.insert(Action::Confirm);
        }
        snap
    }

    pub fn meta(&self) -> Option<Meta> {
        if self.ctrl_c_pressed() || self.any_pressed(&[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')]) {
            return Some(Meta::Quit);
        }
        if self.any_pressed(&[KeyCode::F(1), KeyCode::Char('p'), KeyCode::Char('P')]) {
            return Some(Meta::Pause);
        }
        None
    }
}
