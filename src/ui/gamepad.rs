/// Gamepad input tracker using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Movement (stick is analog)
///   A / L1                →  Reward A
///   B / R1                →  Reward B
///   Start / X             →  Confirm / New game
///   Y                     →  Pause
///   Select                →  Quit

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};
#[cfg(feature = "gamepad")]
use log::info;

use crate::config::GamepadConfig;
use crate::domain::entity::{Action, InputSnapshot};
use crate::domain::geometry::Vec2;
use crate::ui::input::Meta;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    Start,
    Select,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Per-button state: held (continuous) and just_pressed (edge).
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

struct ActionMap {
    reward_a: Vec<Btn>,
    reward_b: Vec<Btn>,
    confirm: Vec<Btn>,
    pause: Vec<Btn>,
    quit: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            reward_a: vec![Btn::A, Btn::L1],
            reward_b: vec![Btn::B, Btn::R1],
            confirm: vec![Btn::Start, Btn::X],
            pause: vec![Btn::Y],
            quit: vec![Btn::Select],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [BtnState; 8],
    /// up, down, left, right
    dpad: [bool; 4],
    stick: Vec2,
    action_map: ActionMap,

    pub connected: bool,
}

fn btn_index(btn: Btn) -> usize {
    btn as usize
}

fn parse_list(names: &[String]) -> Vec<Btn> {
    names.iter().filter_map(|s| Btn::from_name(s)).collect()
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(_) => (None, false),
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            buttons: [BtnState::default(); 8],
            dpad: [false; 4],
            stick: Vec2::ZERO,
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Load button mapping from config. Empty or unrecognised lists keep
    /// the default binding.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        let map = &mut self.action_map;
        for (slot, names) in [
            (&mut map.reward_a, &cfg.reward_a),
            (&mut map.reward_b, &cfg.reward_b),
            (&mut map.confirm, &cfg.confirm),
            (&mut map.pause, &cfg.pause),
            (&mut map.quit, &cfg.quit),
        ] {
            let parsed = parse_list(names);
            if !parsed.is_empty() {
                *slot = parsed;
            }
        }
    }

    pub fn update(&mut self) {
        for b in &mut self.buttons {
            b.just_pressed = false;
        }

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, false);
                }
                EventType::AxisChanged(Axis::LeftStickX, v, _) => self.stick.x = v,
                // gilrs reports up as positive
                EventType::AxisChanged(Axis::LeftStickY, v, _) => self.stick.y = -v,
                EventType::Connected => {
                    self.connected = true;
                    info!("gamepad connected");
                }
                EventType::Disconnected => {
                    self.connected = false;
                    self.release_all();
                    info!("gamepad disconnected");
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool) {
        let dpad = match gilrs_btn {
            Button::DPadUp => Some(0),
            Button::DPadDown => Some(1),
            Button::DPadLeft => Some(2),
            Button::DPadRight => Some(3),
            _ => None,
        };
        if let Some(i) = dpad {
            self.dpad[i] = held;
            return;
        }
        if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            let state = &mut self.buttons[btn_index(btn)];
            if held && !state.held {
                state.just_pressed = true;
            }
            state.held = held;
        }
    }

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[btn_index(b)].just_pressed)
    }

    /// D-pad wins over the stick; stick values inside the deadzone are dropped.
    pub fn movement(&self) -> Vec2 {
        let axis = |neg: bool, pos: bool| match (neg, pos) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let d = Vec2::new(axis(self.dpad[2], self.dpad[3]), axis(self.dpad[0], self.dpad[1]));
        if !d.is_zero() {
            return d;
        }
        let dead = |v: f32| if v.abs() < STICK_DEADZONE { 0.0 } else { v };
        Vec2::new(dead(self.stick.x), dead(self.stick.y)).clamp_unit()
    }

    /// Fold pad input into the keyboard snapshot.
    pub fn merge_into(&self, snap: &mut InputSnapshot) {
        if snap.movement.is_zero() {
            snap.movement = self.movement();
        }
        let map = &self.action_map;
        for (btns, action) in [
            (&map.reward_a, Action::RewardA),
            (&map.reward_b, Action::RewardB),
            (&map.confirm, Action::Confirm),
        ] {
            if self.any_just_pressed(btns) {
                snap.actions.insert(action);
            }
        }
    }

    pub fn meta(&self) -> Option<Meta> {
        if self.any_just_pressed(&self.action_map.quit) {
            Some(Meta::Quit)
        } else if self.any_just_pressed(&self.action_map.pause) {
            Some(Meta::Pause)
        } else {
            None
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.buttons = [BtnState::default(); 8];
        self.dpad = [false; 4];
        self.stick = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> GamepadState {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: None,
            buttons: [BtnState::default(); 8],
            dpad: [false; 4],
            stick: Vec2::ZERO,
            action_map: ActionMap::default(),
            connected: false,
        }
    }

    #[test]
    fn config_names_override_defaults() {
        let mut p = pad();
        let cfg = GamepadConfig {
            reward_a: vec!["x".into()],
            reward_b: vec!["nonsense".into()],
            confirm: vec![],
            pause: vec!["Start".into()],
            quit: vec!["back".into()],
        };
        p.load_button_config(&cfg);
        assert_eq!(p.action_map.reward_a, vec![Btn::X]);
        assert_eq!(p.action_map.reward_b, vec![Btn::B, Btn::R1]);
        assert_eq!(p.action_map.pause, vec![Btn::Start]);
        assert_eq!(p.action_map.quit, vec![Btn::Select]);
    }

    #[test]
    fn stick_deadzone_and_dpad_priority() {
        let mut p = pad();
        p.stick = Vec2::new(0.1, 0.8);
        assert_eq!(p.movement(), Vec2::new(0.0, 0.8));
        p.dpad[2] = true;
        assert_eq!(p.movement(), Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn pressed_buttons_become_actions() {
        let mut p = pad();
        p.buttons[btn_index(Btn::B)].just_pressed = true;
        let mut snap = InputSnapshot::default();
        p.merge_into(&mut snap);
        assert!(snap.pressed(Action::RewardB));
        assert!(!snap.pressed(Action::RewardA));
    }
}
