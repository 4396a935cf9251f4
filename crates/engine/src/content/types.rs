use std::path::PathBuf;

use crate::geometry::{Rect, Vec2i};
use crate::world::{EventBoxPhase, LayerSlot, VerticalBounds};

/// Line/column of the XML node an error points at (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// A parsed level file. References between entities are by string id and have been
/// checked to resolve within the level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDef {
    pub name: String,
    pub source: PathBuf,
    pub time_periods: Vec<TimePeriodDef>,
}

impl LevelDef {
    /// Start position of the first period's default area.
    pub fn start_position(&self) -> Option<Vec2i> {
        self.time_periods
            .first()
            .and_then(|period| period.areas.first())
            .and_then(|area| area.start)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimePeriodDef {
    pub name: String,
    pub areas: Vec<AreaDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaDef {
    pub key: String,
    pub width: i32,
    pub height: i32,
    pub start: Option<Vec2i>,
    pub bottom: VerticalBounds,
    pub entities: Vec<EntityDef>,
    pub event_boxes: Vec<EventBoxDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityDefKind {
    Scenery,
    Item,
    Artifact,
    Door,
    Button,
    Shelter,
    Marker,
}

impl EntityDefKind {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "scenery" => Self::Scenery,
            "item" => Self::Item,
            "artifact" => Self::Artifact,
            "door" => Self::Door,
            "button" => Self::Button,
            "shelter" => Self::Shelter,
            "marker" => Self::Marker,
            _ => return None,
        })
    }
}

/// Where an entity goes: an explicit rect, or a top-left corner with the size taken
/// from its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Rect(Rect),
    At(Vec2i),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub id: Option<String>,
    pub kind: EntityDefKind,
    pub layer: LayerSlot,
    pub placement: Placement,
    pub image: Option<String>,
    pub interior_image: Option<String>,
    pub collidable: Option<bool>,
    pub lethal: bool,
    pub pixel_collisions: bool,
    pub gravity: Option<bool>,
    pub grabbable: Option<bool>,
    pub visible: bool,
    pub reverse_gravity: bool,
    pub float: bool,
    pub destination: Option<String>,
    pub collision_rects: Vec<Rect>,
}

impl EntityDef {
    /// Display name: the id when present, the image otherwise.
    pub fn name(&self) -> &str {
        self.id
            .as_deref()
            .or(self.image.as_deref())
            .unwrap_or("entity")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBoxActionKind {
    /// Sets reverse gravity on the entity that caused the notice.
    ReverseGravity,
    Show,
    Hide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBoxActionDef {
    pub phase: EventBoxPhase,
    pub kind: EventBoxActionKind,
    pub target: Option<String>,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBoxDef {
    pub id: Option<String>,
    /// Entity ids whose moves the box observes; `player` names the player.
    pub watch: Vec<String>,
    pub rects: Vec<Rect>,
    pub actions: Vec<EventBoxActionDef>,
}
