use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::geometry::{Rect, Vec2i};
use crate::world::{EventBoxPhase, LayerSlot, VerticalBounds};

use super::types::{
    AreaDef, EntityDef, EntityDefKind, EventBoxActionDef, EventBoxActionKind, EventBoxDef,
    LevelDef, Placement, SourceLocation, TimePeriodDef,
};

/// Reference naming the player in `watch` lists.
pub const PLAYER_REF: &str = "player";

const ENTITY_ATTRIBUTES: &[&str] = &[
    "id",
    "kind",
    "layer",
    "rect",
    "at",
    "image",
    "interiorImage",
    "collidable",
    "lethal",
    "pixelCollisions",
    "gravity",
    "grabbable",
    "visible",
    "reverseGravity",
    "float",
    "destination",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateId,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

struct Source<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl Source<'_, '_> {
    fn error(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn check_attributes(&self, node: Node<'_, '_>, allowed: &[&str]) -> Result<(), ContentCompileError> {
        for attribute in node.attributes() {
            if !allowed.contains(&attribute.name()) {
                return Err(self.error(
                    ContentErrorCode::UnknownField,
                    format!(
                        "unknown attribute `{}` on <{}>",
                        attribute.name(),
                        node.tag_name().name()
                    ),
                    node,
                ));
            }
        }
        Ok(())
    }

    fn required_attr<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, ContentCompileError> {
        let value = node.attribute(name).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!(
                    "missing required attribute `{name}` on <{}>",
                    node.tag_name().name()
                ),
                node,
            ));
        }
        Ok(value)
    }

    fn parsed_attr<T>(
        &self,
        node: Node<'_, '_>,
        name: &str,
        expected: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ContentCompileError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        parse(raw.trim()).map(Some).ok_or_else(|| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("attribute `{name}`='{raw}' is not {expected}"),
                node,
            )
        })
    }

    fn flag(&self, node: Node<'_, '_>, name: &str) -> Result<Option<bool>, ContentCompileError> {
        self.parsed_attr(node, name, "true or false", parse_bool)
    }

    fn unknown_element(&self, node: Node<'_, '_>, parent: &str) -> ContentCompileError {
        self.error(
            ContentErrorCode::UnknownElement,
            format!("unsupported element <{}> in <{parent}>", node.tag_name().name()),
            node,
        )
    }
}

/// Entity ids declared in a level and the references that must resolve to them.
#[derive(Default)]
struct References<'a, 'input> {
    declared: HashSet<String>,
    pending: Vec<(String, Node<'a, 'input>, bool)>,
}

impl<'a, 'input> References<'a, 'input> {
    fn declare(
        &mut self,
        source: &Source<'_, '_>,
        id: &str,
        node: Node<'a, 'input>,
    ) -> Result<(), ContentCompileError> {
        if id == PLAYER_REF || !self.declared.insert(id.to_string()) {
            return Err(source.error(
                ContentErrorCode::DuplicateId,
                format!("entity id '{id}' is already taken in this level"),
                node,
            ));
        }
        Ok(())
    }

    fn require(&mut self, id: &str, node: Node<'a, 'input>, allow_player: bool) {
        self.pending.push((id.to_string(), node, allow_player));
    }

    fn check(&self, source: &Source<'_, '_>) -> Result<(), ContentCompileError> {
        for (id, node, allow_player) in &self.pending {
            let resolves = self.declared.contains(id) || (*allow_player && id == PLAYER_REF);
            if !resolves {
                return Err(source.error(
                    ContentErrorCode::UnknownReference,
                    format!("reference to unknown entity '{id}'"),
                    *node,
                ));
            }
        }
        Ok(())
    }
}

/// Parses one `<Level>` document.
pub fn compile_level(file_path: &Path, raw: &str) -> Result<LevelDef, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let source = Source {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Level" {
        return Err(source.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Level>".to_string(),
            root,
        ));
    }
    source.check_attributes(root, &["name"])?;
    let name = source.required_attr(root, "name")?.to_string();

    let mut references = References::default();
    let mut time_periods = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "TimePeriod" {
            return Err(source.unknown_element(child, "Level"));
        }
        time_periods.push(parse_time_period(&source, child, &mut references)?);
    }
    if time_periods.is_empty() {
        return Err(source.error(
            ContentErrorCode::MissingField,
            "a level needs at least one <TimePeriod>".to_string(),
            root,
        ));
    }
    references.check(&source)?;

    Ok(LevelDef {
        name,
        source: file_path.to_path_buf(),
        time_periods,
    })
}

fn parse_time_period<'a, 'input>(
    source: &Source<'_, '_>,
    node: Node<'a, 'input>,
    references: &mut References<'a, 'input>,
) -> Result<TimePeriodDef, ContentCompileError> {
    source.check_attributes(node, &["name"])?;
    let name = source.required_attr(node, "name")?.to_string();

    let mut keys = HashSet::<String>::new();
    let mut areas = Vec::new();
    for child in node.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "Area" {
            return Err(source.unknown_element(child, "TimePeriod"));
        }
        let area = parse_area(source, child, references)?;
        if !keys.insert(area.key.clone()) {
            return Err(source.error(
                ContentErrorCode::DuplicateId,
                format!("area key '{}' appears twice in time period '{name}'", area.key),
                child,
            ));
        }
        areas.push(area);
    }
    if areas.is_empty() {
        return Err(source.error(
            ContentErrorCode::MissingField,
            format!("time period '{name}' has no <Area>"),
            node,
        ));
    }
    Ok(TimePeriodDef { name, areas })
}

fn parse_area<'a, 'input>(
    source: &Source<'_, '_>,
    node: Node<'a, 'input>,
    references: &mut References<'a, 'input>,
) -> Result<AreaDef, ContentCompileError> {
    source.check_attributes(node, &["key", "width", "height", "start", "bottom"])?;
    let key = source.required_attr(node, "key")?.to_string();
    source.required_attr(node, "width")?;
    source.required_attr(node, "height")?;
    let width = source
        .parsed_attr(node, "width", "a positive integer", parse_dimension)?
        .unwrap_or_default();
    let height = source
        .parsed_attr(node, "height", "a positive integer", parse_dimension)?
        .unwrap_or_default();
    let start = source.parsed_attr(node, "start", "a point `x,y`", parse_point)?;
    let bottom = source
        .parsed_attr(node, "bottom", "`open` or `clamped`", parse_bounds)?
        .unwrap_or_default();

    let mut entities = Vec::new();
    let mut event_boxes = Vec::new();
    for child in node.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "Entity" => entities.push(parse_entity(source, child, references)?),
            "EventBox" => event_boxes.push(parse_event_box(source, child, references)?),
            _ => return Err(source.unknown_element(child, "Area")),
        }
    }

    Ok(AreaDef {
        key,
        width,
        height,
        start,
        bottom,
        entities,
        event_boxes,
    })
}

fn parse_entity<'a, 'input>(
    source: &Source<'_, '_>,
    node: Node<'a, 'input>,
    references: &mut References<'a, 'input>,
) -> Result<EntityDef, ContentCompileError> {
    source.check_attributes(node, ENTITY_ATTRIBUTES)?;

    let id = node.attribute("id").map(|id| id.trim().to_string());
    if let Some(id) = &id {
        references.declare(source, id, node)?;
    }
    let kind = source
        .parsed_attr(
            node,
            "kind",
            "one of scenery, item, artifact, door, button, shelter, marker",
            EntityDefKind::parse,
        )?
        .unwrap_or(EntityDefKind::Scenery);
    let layer = source
        .parsed_attr(
            node,
            "layer",
            "one of default, background, main, foreground",
            parse_layer,
        )?
        .unwrap_or_default();
    let image = node.attribute("image").map(|image| image.trim().to_string());

    let rect = source.parsed_attr(node, "rect", "a rect `x,y,width,height`", parse_rect)?;
    let at = source.parsed_attr(node, "at", "a point `x,y`", parse_point)?;
    let placement = match (rect, at) {
        (Some(_), Some(_)) => {
            return Err(source.error(
                ContentErrorCode::DuplicateField,
                "entity is placed by both `rect` and `at`".to_string(),
                node,
            ))
        }
        (Some(rect), None) => Placement::Rect(rect),
        (None, Some(_)) if image.is_none() => {
            return Err(source.error(
                ContentErrorCode::MissingField,
                "an entity placed with `at` needs an `image` to size it".to_string(),
                node,
            ))
        }
        (None, Some(at)) => Placement::At(at),
        (None, None) => {
            return Err(source.error(
                ContentErrorCode::MissingField,
                "entity needs a `rect` or an `at` position".to_string(),
                node,
            ))
        }
    };

    let destination = node
        .attribute("destination")
        .map(|destination| destination.trim().to_string());
    match (&destination, kind) {
        (None, EntityDefKind::Door) => {
            return Err(source.error(
                ContentErrorCode::MissingField,
                "a door needs a `destination`".to_string(),
                node,
            ))
        }
        (Some(_), kind) if kind != EntityDefKind::Door => {
            return Err(source.error(
                ContentErrorCode::InvalidValue,
                "only doors take a `destination`".to_string(),
                node,
            ))
        }
        (Some(destination), _) => references.require(destination, node, false),
        (None, _) => {}
    }

    let mut collision_rects = Vec::new();
    for child in node.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "CollisionRect" {
            return Err(source.unknown_element(child, "Entity"));
        }
        source.check_attributes(child, &["rect"])?;
        source.required_attr(child, "rect")?;
        if let Some(rect) =
            source.parsed_attr(child, "rect", "a rect `x,y,width,height`", parse_rect)?
        {
            collision_rects.push(rect);
        }
    }

    Ok(EntityDef {
        id,
        kind,
        layer,
        placement,
        image,
        interior_image: node
            .attribute("interiorImage")
            .map(|image| image.trim().to_string()),
        collidable: source.flag(node, "collidable")?,
        lethal: source.flag(node, "lethal")?.unwrap_or(false),
        pixel_collisions: source.flag(node, "pixelCollisions")?.unwrap_or(false),
        gravity: source.flag(node, "gravity")?,
        grabbable: source.flag(node, "grabbable")?,
        visible: source.flag(node, "visible")?.unwrap_or(true),
        reverse_gravity: source.flag(node, "reverseGravity")?.unwrap_or(false),
        float: source.flag(node, "float")?.unwrap_or(false),
        destination,
        collision_rects,
    })
}

fn parse_event_box<'a, 'input>(
    source: &Source<'_, '_>,
    node: Node<'a, 'input>,
    references: &mut References<'a, 'input>,
) -> Result<EventBoxDef, ContentCompileError> {
    source.check_attributes(node, &["id", "watch"])?;
    let id = node.attribute("id").map(|id| id.trim().to_string());
    let watch = node
        .attribute("watch")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    for watched in &watch {
        references.require(watched, node, true);
    }

    let mut rects = Vec::new();
    let mut actions = Vec::new();
    for child in node.children().filter(|node| node.is_element()) {
        let phase = match child.tag_name().name() {
            "Rect" => {
                source.check_attributes(child, &["rect"])?;
                source.required_attr(child, "rect")?;
                if let Some(rect) =
                    source.parsed_attr(child, "rect", "a rect `x,y,width,height`", parse_rect)?
                {
                    rects.push(rect);
                }
                continue;
            }
            "OnEnter" => EventBoxPhase::Entered,
            "OnMove" => EventBoxPhase::Moved,
            "OnExit" => EventBoxPhase::Exited,
            _ => return Err(source.unknown_element(child, "EventBox")),
        };
        actions.push(parse_action(source, child, phase, references)?);
    }
    if rects.is_empty() {
        return Err(source.error(
            ContentErrorCode::MissingField,
            "an event box needs at least one <Rect>".to_string(),
            node,
        ));
    }

    Ok(EventBoxDef {
        id,
        watch,
        rects,
        actions,
    })
}

fn parse_action<'a, 'input>(
    source: &Source<'_, '_>,
    node: Node<'a, 'input>,
    phase: EventBoxPhase,
    references: &mut References<'a, 'input>,
) -> Result<EventBoxActionDef, ContentCompileError> {
    source.check_attributes(node, &["action", "target", "value"])?;
    let action = source.required_attr(node, "action")?;
    let kind = match action {
        "reverseGravity" => EventBoxActionKind::ReverseGravity,
        "show" => EventBoxActionKind::Show,
        "hide" => EventBoxActionKind::Hide,
        other => {
            return Err(source.error(
                ContentErrorCode::InvalidValue,
                format!("unknown action '{other}'; allowed values: reverseGravity, show, hide"),
                node,
            ))
        }
    };

    let target = match kind {
        EventBoxActionKind::ReverseGravity => None,
        EventBoxActionKind::Show | EventBoxActionKind::Hide => {
            let target = source.required_attr(node, "target")?;
            references.require(target, node, false);
            Some(target.to_string())
        }
    };
    let value = source.flag(node, "value")?.unwrap_or(true);

    Ok(EventBoxActionDef {
        phase,
        kind,
        target,
        value,
    })
}

fn parse_numbers<const N: usize>(value: &str) -> Option<[i32; N]> {
    let mut out = [0; N];
    let mut parts = value.split(',');
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn parse_rect(value: &str) -> Option<Rect> {
    let [x, y, width, height] = parse_numbers::<4>(value)?;
    (width > 0 && height > 0).then(|| Rect::new(x, y, width, height))
}

fn parse_point(value: &str) -> Option<Vec2i> {
    let [x, y] = parse_numbers::<2>(value)?;
    Some(Vec2i::new(x, y))
}

fn parse_dimension(value: &str) -> Option<i32> {
    value.parse::<i32>().ok().filter(|value| *value > 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_layer(value: &str) -> Option<LayerSlot> {
    LayerSlot::ALL
        .into_iter()
        .find(|slot| slot.name() == value)
}

fn parse_bounds(value: &str) -> Option<VerticalBounds> {
    match value {
        "open" => Some(VerticalBounds::Open),
        "clamped" => Some(VerticalBounds::Clamped),
        _ => None,
    }
}
