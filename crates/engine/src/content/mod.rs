mod builder;
mod compiler;
mod discovery;
mod types;

pub use builder::{build_world, BuildError};
pub use compiler::{compile_level, ContentCompileError, ContentErrorCode, PLAYER_REF};
pub use discovery::load_levels;
pub use types::{
    AreaDef, EntityDef, EntityDefKind, EventBoxActionDef, EventBoxActionKind, EventBoxDef,
    LevelDef, Placement, SourceLocation, TimePeriodDef,
};
