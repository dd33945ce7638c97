/// Gamepad input using gilrs.
///
/// A button press is translated into the keyboard key of the control it is
/// bound to, so the player sees one kind of input. Button mapping comes from
/// the `[gamepad]` section of config.toml.
/// Default mapping:
///   Start   →  Pause
///   R1      →  Next song
///   L1      →  Previous song
///   Y       →  Allow / disallow music
///   X       →  Allow / disallow sounds

#[cfg(feature = "gamepad")]
use gilrs::{Button, EventType, Gilrs};

use crate::config::{ControlKeys, GamepadConfig};
use crate::sim::event::{Key, PlayerEvent};

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,      // LeftTrigger
    R1,      // RightTrigger
    L2,      // LeftTrigger2
    R2,      // RightTrigger2
    Start,
    Select,
    Left,    // D-pad
    Right,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "L2" | "LT" | "LEFTTRIGGER2"  => Some(Btn::L2),
            "R2" | "RT" | "RIGHTTRIGGER2" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            "LEFT" | "DPADLEFT" => Some(Btn::Left),
            "RIGHT" | "DPADRIGHT" => Some(Btn::Right),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            Button::DPadLeft  => Some(Btn::Left),
            Button::DPadRight => Some(Btn::Right),
            _ => None,
        }
    }
}

/// The controls a gamepad can reach.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    Pause,
    Next,
    Previous,
    AllowMusic,
    AllowSounds,
}

impl Action {
    fn key(self, keys: &ControlKeys) -> Key {
        match self {
            Action::Pause => keys.pause,
            Action::Next => keys.next,
            Action::Previous => keys.previous,
            Action::AllowMusic => keys.allow_music,
            Action::AllowSounds => keys.allow_sounds,
        }
    }
}

/// Action-to-button mapping (loaded from config).
struct ActionMap {
    bindings: Vec<(Action, Vec<Btn>)>,
}

impl ActionMap {
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn parse_list(names: &[String], fallback: Vec<Btn>) -> Vec<Btn> {
            let btns: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if btns.is_empty() { fallback } else { btns }
        }
        ActionMap {
            bindings: vec![
                (Action::Pause, parse_list(&cfg.pause, vec![Btn::Start])),
                (Action::Next, parse_list(&cfg.next, vec![Btn::R1])),
                (Action::Previous, parse_list(&cfg.previous, vec![Btn::L1])),
                (Action::AllowMusic, parse_list(&cfg.allow_music, vec![Btn::Y])),
                (Action::AllowSounds, parse_list(&cfg.allow_sounds, vec![Btn::X])),
            ],
        }
    }

    /// First action bound to `btn`.
    fn action(&self, btn: Btn) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(_, btns)| btns.contains(&btn))
            .map(|(action, _)| *action)
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new(cfg: &GamepadConfig) -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = {
            match Gilrs::new() {
                Ok(g) => {
                    let has_pad = g.gamepads().next().is_some();
                    (Some(g), has_pad)
                }
                Err(e) => {
                    log::debug!("Gamepad support unavailable: {e}");
                    (None, false)
                }
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            action_map: ActionMap::from_config(cfg),
            connected,
        }
    }

    /// Translate pending button presses into key events.
    #[cfg_attr(not(feature = "gamepad"), allow(unused_variables))]
    pub fn drain_events(&mut self, keys: &ControlKeys, out: &mut Vec<PlayerEvent>) {
        #[cfg(feature = "gamepad")]
        for btn in self.poll_gilrs() {
            if let Some(action) = self.action_map.action(btn) {
                out.push(PlayerEvent::KeyDown(action.key(keys)));
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) -> Vec<Btn> {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return Vec::new(),
        };

        let mut pressed = Vec::new();
        while let Some(event) = gilrs.next_event() {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    pressed.extend(Btn::from_gilrs(btn));
                }
                EventType::Connected => {
                    log::debug!("Gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    log::debug!("Gamepad disconnected");
                    self.connected = false;
                }
                _ => {}
            }
        }
        pressed
    }
}
