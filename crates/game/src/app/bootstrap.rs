use timeslip_engine::{resolve_app_paths, AppPaths};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{load_game_config, GameConfig};
use super::replay::{read_replay, ReplayScript};

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) config: GameConfig,
    pub(crate) replay: Option<ReplayScript>,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    info!(
        root = %paths.root.display(),
        levels_dir = %paths.levels_dir.display(),
        images_dir = %paths.images_dir.display(),
        "startup"
    );

    let config = load_game_config(&paths)?;
    let replay = match &config.replay {
        Some(relative) => {
            let script = read_replay(&paths.assets_dir.join(relative))?;
            info!(
                path = %relative.display(),
                steps = script.steps.len(),
                "replay_loaded"
            );
            Some(script)
        }
        None => None,
    };

    Ok(AppWiring {
        paths,
        config,
        replay,
    })
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
