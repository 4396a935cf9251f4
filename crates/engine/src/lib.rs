use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod assets;
pub mod content;
pub mod geometry;
pub mod mask;
pub mod session;
pub mod signal;
pub mod world;

pub use app::{
    run_fixed_loop, AppError, InputAction, InputEvent, KeyState, LoopConfig, LoopControl,
    LoopMetricsSnapshot, LoopSummary, MetricsHandle, Simulation, StopReason,
};
pub use assets::{AssetError, AssetProvider, ImageAsset, ImageDirAssets, MemoryAssets};
pub use content::{
    build_world, compile_level, load_levels, BuildError, ContentCompileError, ContentErrorCode,
    LevelDef, SourceLocation,
};
pub use geometry::{Rect, Vec2i};
pub use session::{LevelChanged, Session, SessionError, SessionState, LEVEL_TRANSITION_MS};
pub use signal::{Signal, SubscriptionId};
pub use world::{PeriodSwitch, World, WorldConfig, WorldSignals};

pub const ROOT_ENV_VAR: &str = "TIMESLIP_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub levels_dir: PathBuf,
    pub images_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("levels directory not found at {path}")]
    MissingLevelsDir { path: PathBuf },
    #[error(
        "TIMESLIP_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\timeslip\"\n\
Bash/zsh: export {env_var}=\"/path/to/timeslip\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Locates the project root and the asset directories below it.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = app_paths_for(resolve_root()?);
    if !paths.levels_dir.is_dir() {
        return Err(StartupError::MissingLevelsDir {
            path: paths.levels_dir,
        });
    }
    Ok(paths)
}

fn app_paths_for(root: PathBuf) -> AppPaths {
    let assets_dir = root.join("assets");
    AppPaths {
        levels_dir: assets_dir.join("levels"),
        images_dir: assets_dir.join("images"),
        assets_dir,
        root,
    }
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));
    }

    #[test]
    fn repo_marker_accepts_cargo_toml_with_assets() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("write manifest");
        assert!(!is_repo_marker(temp.path()));

        fs::create_dir_all(temp.path().join("assets")).expect("create assets");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn asset_dirs_hang_off_the_root() {
        let paths = app_paths_for(PathBuf::from("/games/timeslip"));
        assert_eq!(paths.assets_dir, Path::new("/games/timeslip/assets"));
        assert_eq!(paths.levels_dir, Path::new("/games/timeslip/assets/levels"));
        assert_eq!(paths.images_dir, Path::new("/games/timeslip/assets/images"));
    }
}
