use std::fs;
use std::path::Path;

use serde::Deserialize;
use timeslip_engine::{InputAction, InputEvent, KeyState};

/// Input events keyed by the tick on which they are delivered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReplayScript {
    pub(crate) steps: Vec<ReplayStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReplayStep {
    pub(crate) tick: u64,
    pub(crate) action: InputAction,
    pub(crate) state: KeyState,
}

impl ReplayStep {
    fn event(&self) -> InputEvent {
        InputEvent {
            action: self.action,
            state: self.state,
        }
    }
}

pub(crate) fn parse_replay(raw: &str) -> Result<ReplayScript, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let script = match serde_path_to_error::deserialize::<_, ReplayScript>(&mut deserializer) {
        Ok(script) => script,
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            return if path.is_empty() || path == "." {
                Err(format!("parse replay json: {source}"))
            } else {
                Err(format!("parse replay json at {path}: {source}"))
            };
        }
    };

    for (index, pair) in script.steps.windows(2).enumerate() {
        if pair[1].tick < pair[0].tick {
            return Err(format!(
                "validation failed at steps[{}].tick: expected >= {}, got {}",
                index + 1,
                pair[0].tick,
                pair[1].tick
            ));
        }
    }
    Ok(script)
}

pub(crate) fn read_replay(path: &Path) -> Result<ReplayScript, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read replay '{}': {error}", path.display()))?;
    parse_replay(&raw).map_err(|error| format!("{error} ({})", path.display()))
}

/// Plays a script forward one tick at a time.
#[derive(Debug)]
pub(crate) struct ReplayCursor {
    steps: Vec<ReplayStep>,
    next: usize,
}

impl ReplayCursor {
    pub(crate) fn new(script: ReplayScript) -> Self {
        Self {
            steps: script.steps,
            next: 0,
        }
    }

    /// Events scheduled for `tick`. Steps whose tick has already passed are delivered
    /// too, so nothing is skipped.
    pub(crate) fn events_for(&mut self, tick: u64) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while let Some(step) = self.steps.get(self.next) {
            if step.tick > tick {
                break;
            }
            events.push(step.event());
            self.next += 1;
        }
        events
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.next >= self.steps.len()
    }
}
