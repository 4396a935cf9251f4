use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    Jump,
    Grab,
    Trigger,
    SwitchTimePeriod(usize),
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputEvent {
    pub action: InputAction,
    pub state: KeyState,
}

impl InputEvent {
    pub const fn pressed(action: InputAction) -> Self {
        Self {
            action,
            state: KeyState::Pressed,
        }
    }

    pub const fn released(action: InputAction) -> Self {
        Self {
            action,
            state: KeyState::Released,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.state == KeyState::Pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_snake_case_json() {
        let event: InputEvent =
            serde_json::from_str(r#"{"action":{"switch_time_period":2},"state":"pressed"}"#)
                .expect("parse event");
        assert_eq!(event, InputEvent::pressed(InputAction::SwitchTimePeriod(2)));

        let jump: InputEvent = serde_json::from_str(r#"{"action":"jump","state":"released"}"#)
            .expect("parse jump");
        assert!(!jump.is_pressed());
    }
}
