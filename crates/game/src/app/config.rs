use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use timeslip_engine::{AppPaths, LoopConfig, WorldConfig};

pub(crate) const CONFIG_ENV_VAR: &str = "TIMESLIP_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config.json";

pub(crate) type ConfigResult<T> = Result<T, String>;

/// Runner configuration read from JSON. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) world: WorldConfig,
    #[serde(rename = "loop")]
    pub(crate) loop_settings: LoopSettings,
    /// Scripted input, relative to the assets directory.
    pub(crate) replay: Option<PathBuf>,
    /// Stop once the replay has been fully played and this many more ticks have run.
    pub(crate) linger_ticks: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LoopSettings {
    pub(crate) target_tps: Option<u32>,
    pub(crate) max_frame_delta_ms: u64,
    pub(crate) max_ticks_per_frame: u32,
    pub(crate) metrics_log_interval_ms: u64,
    pub(crate) max_ticks: Option<u64>,
    pub(crate) realtime: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            target_tps: None,
            max_frame_delta_ms: defaults.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame: defaults.max_ticks_per_frame,
            metrics_log_interval_ms: defaults.metrics_log_interval.as_millis() as u64,
            max_ticks: defaults.max_ticks,
            realtime: defaults.realtime,
        }
    }
}

impl GameConfig {
    /// Loop settings; the tick rate follows the world's frame rate unless overridden.
    pub(crate) fn loop_config(&self) -> LoopConfig {
        let settings = &self.loop_settings;
        LoopConfig {
            target_tps: settings.target_tps.unwrap_or(self.world.frame_rate),
            max_frame_delta: Duration::from_millis(settings.max_frame_delta_ms),
            max_ticks_per_frame: settings.max_ticks_per_frame,
            metrics_log_interval: Duration::from_millis(settings.metrics_log_interval_ms),
            max_ticks: settings.max_ticks,
            realtime: settings.realtime,
        }
    }
}

pub(crate) fn parse_game_config(raw: &str) -> ConfigResult<GameConfig> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse config json: {source}"))
            } else {
                Err(format!("parse config json at {path}: {source}"))
            }
        }
    }
}

/// Reads the config named by `TIMESLIP_CONFIG`, else `assets/config.json` when present,
/// else the defaults.
pub(crate) fn load_game_config(paths: &AppPaths) -> ConfigResult<GameConfig> {
    let explicit = match env::var(CONFIG_ENV_VAR) {
        Ok(value) => Some(PathBuf::from(value)),
        Err(env::VarError::NotPresent) => None,
        Err(error) => return Err(format!("read {CONFIG_ENV_VAR}: {error}")),
    };
    let path = explicit
        .clone()
        .unwrap_or_else(|| paths.assets_dir.join(DEFAULT_CONFIG_FILE));
    if explicit.is_none() && !path.is_file() {
        return Ok(GameConfig::default());
    }
    read_game_config(&path)
}

pub(crate) fn read_game_config(path: &Path) -> ConfigResult<GameConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read config '{}': {error}", path.display()))?;
    parse_game_config(&raw).map_err(|error| format!("{error} ({})", path.display()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = parse_game_config("{}").expect("parse");
        assert_eq!(config, GameConfig::default());

        let loop_config = config.loop_config();
        assert_eq!(loop_config.target_tps, 30);
        assert_eq!(loop_config.max_frame_delta, Duration::from_millis(250));
        assert!(loop_config.realtime);
    }

    #[test]
    fn nested_sections_override_defaults() {
        let config = parse_game_config(
            r#"{
                "world": { "frame_rate": 60, "god_mode": true },
                "loop": { "max_ticks": 900, "realtime": false },
                "replay": "replays/demo.json"
            }"#,
        )
        .expect("parse");

        assert_eq!(config.world.frame_rate, 60);
        assert!(config.world.god_mode);
        assert_eq!(config.world.fall_speed, WorldConfig::default().fall_speed);
        assert_eq!(config.replay.as_deref(), Some(Path::new("replays/demo.json")));

        let loop_config = config.loop_config();
        assert_eq!(loop_config.target_tps, 60);
        assert_eq!(loop_config.max_ticks, Some(900));
        assert!(!loop_config.realtime);
    }

    #[test]
    fn errors_name_the_offending_field() {
        let err = parse_game_config(r#"{ "world": { "fall_speed": "fast" } }"#)
            .expect_err("bad type should fail");
        assert!(err.contains("world.fall_speed"), "{err}");

        let err = parse_game_config(r#"{ "loop": { "tps": 30 } }"#)
            .expect_err("unknown field should fail");
        assert!(err.contains("unknown field"), "{err}");
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "linger_ticks": 15 }"#).expect("write config");

        let config = read_game_config(&path).expect("read");
        assert_eq!(config.linger_ticks, Some(15));

        let missing = read_game_config(&temp.path().join("absent.json")).expect_err("missing");
        assert!(missing.contains("absent.json"));
    }
}
