use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::assets::{AssetError, AssetProvider, ImageAsset};
use crate::world::{
    AreaId, Entity, EntityAction, EntityFlags, EntityId, EntityKind, ItemState, World,
    WorldConfig,
};

use super::compiler::PLAYER_REF;
use super::types::{
    EntityDef, EntityDefKind, EventBoxActionKind, EventBoxDef, LevelDef, Placement,
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("level '{level}': {source}")]
    Asset {
        level: String,
        #[source]
        source: AssetError,
    },
    #[error("level '{level}' references unknown entity '{id}'")]
    UnknownReference { level: String, id: String },
    #[error("level '{level}': entity '{entity}' is placed by position but has no image")]
    Unsized { level: String, entity: String },
    #[error("level '{level}' has no time periods")]
    EmptyLevel { level: String },
}

/// Builds a fresh world for `def`. Areas, entities and event boxes are created in
/// definition order; the player is spawned detached at the level's start position.
pub fn build_world(
    def: &LevelDef,
    assets: &dyn AssetProvider,
    config: WorldConfig,
) -> Result<World, BuildError> {
    if def.time_periods.is_empty() {
        return Err(BuildError::EmptyLevel {
            level: def.name.clone(),
        });
    }

    let mut world = World::new(def.name.clone(), config);
    let mut named = HashMap::<&str, EntityId>::new();
    let mut doors = Vec::<(EntityId, &str)>::new();
    let mut pending_boxes = Vec::<(AreaId, &EventBoxDef)>::new();

    for period_def in &def.time_periods {
        let period = world.add_time_period(period_def.name.clone());
        for area_def in &period_def.areas {
            let area = world.add_area(period, &area_def.key, area_def.width, area_def.height);
            let target = world.area_mut(area);
            if let Some(start) = area_def.start {
                target.set_start_position(start);
            }
            target.set_vertical_bounds(area_def.bottom);

            for entity_def in &area_def.entities {
                let entity = build_entity(def, entity_def, assets)?;
                let obeys_gravity = entity.flags.obeys_gravity;
                let id = world.spawn(entity);
                let layer = world.area_mut(area).layer_ref(entity_def.layer);
                world.add_to_layer(layer, &[id]);
                if obeys_gravity {
                    world.fall(id);
                }
                if entity_def.float {
                    world.start_float(id);
                }
                if let Some(name) = entity_def.id.as_deref() {
                    named.insert(name, id);
                }
                if let Some(destination) = entity_def.destination.as_deref() {
                    doors.push((id, destination));
                }
            }
            pending_boxes.extend(area_def.event_boxes.iter().map(|event_box| (area, event_box)));
        }
    }

    let resolve = |id: &str| {
        named
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::UnknownReference {
                level: def.name.clone(),
                id: id.to_string(),
            })
    };

    for (door, destination) in doors {
        let target = resolve(destination)?;
        if let Some(Entity {
            kind: EntityKind::Door { destination },
            ..
        }) = world.entity_mut(door)
        {
            *destination = Some(target);
        }
    }

    let start = def.start_position().unwrap_or_default();
    let player = world.spawn_player(start);

    for (area, box_def) in pending_boxes {
        let box_id = world.add_event_box(area, box_def.id.clone());
        let mut actions = Vec::with_capacity(box_def.actions.len());
        for action in &box_def.actions {
            let bound = match action.kind {
                EventBoxActionKind::ReverseGravity => EntityAction::SetReverseGravity(action.value),
                EventBoxActionKind::Show => {
                    EntityAction::Show(resolve(action.target.as_deref().unwrap_or_default())?)
                }
                EventBoxActionKind::Hide => {
                    EntityAction::Hide(resolve(action.target.as_deref().unwrap_or_default())?)
                }
            };
            actions.push((action.phase, bound));
        }
        if let Some(event_box) = world.event_box_mut(box_id) {
            for rect in &box_def.rects {
                event_box.add_rect(*rect);
            }
            for (phase, action) in actions {
                event_box.bind(phase, action);
            }
        }
        for watched in &box_def.watch {
            let entity = if watched == PLAYER_REF {
                player
            } else {
                resolve(watched)?
            };
            world.watch(box_id, entity);
        }
    }

    debug!(
        level = %def.name,
        entities = world.entities().len(),
        areas = world.areas().len(),
        "world_built"
    );
    Ok(world)
}

fn load_image(
    level: &LevelDef,
    assets: &dyn AssetProvider,
    name: &str,
) -> Result<Arc<ImageAsset>, BuildError> {
    assets.load_image(name).map_err(|source| BuildError::Asset {
        level: level.name.clone(),
        source,
    })
}

fn build_entity(
    level: &LevelDef,
    def: &EntityDef,
    assets: &dyn AssetProvider,
) -> Result<Entity, BuildError> {
    let image = def
        .image
        .as_deref()
        .map(|name| load_image(level, assets, name))
        .transpose()?;

    let mut entity = match (def.placement, &image) {
        (Placement::At(at), Some(image)) => Entity::with_image(def.name(), at, Arc::clone(image)),
        (Placement::At(_), None) => {
            return Err(BuildError::Unsized {
                level: level.name.clone(),
                entity: def.name().to_string(),
            })
        }
        (Placement::Rect(rect), _) => {
            let mut entity = Entity::new(def.name(), rect);
            entity.appearance = image.clone();
            entity
        }
    };
    if !def.collision_rects.is_empty() {
        entity = entity.collision_shape(def.collision_rects.clone());
    }

    let mut flags = EntityFlags::default();
    entity.kind = match def.kind {
        EntityDefKind::Scenery => EntityKind::Scenery,
        EntityDefKind::Item | EntityDefKind::Artifact => {
            flags.grabbable = true;
            flags.obeys_gravity = true;
            flags.should_check_collisions = true;
            EntityKind::Item(ItemState {
                artifact: def.kind == EntityDefKind::Artifact,
            })
        }
        EntityDefKind::Door => {
            flags.collidable = false;
            EntityKind::Door { destination: None }
        }
        EntityDefKind::Button => EntityKind::Button { pressed: false },
        EntityDefKind::Shelter => EntityKind::Shelter {
            exterior: image.clone(),
            interior: def
                .interior_image
                .as_deref()
                .map(|name| load_image(level, assets, name))
                .transpose()?,
            inside: false,
        },
        EntityDefKind::Marker => {
            flags.collidable = false;
            EntityKind::Marker
        }
    };

    if let Some(collidable) = def.collidable {
        flags.collidable = collidable;
    }
    if let Some(gravity) = def.gravity {
        flags.obeys_gravity = gravity;
        flags.should_check_collisions |= gravity;
    }
    if let Some(grabbable) = def.grabbable {
        flags.grabbable = grabbable;
    }
    flags.lethal = def.lethal;
    flags.use_pixel_collisions = def.pixel_collisions;
    flags.visible = def.visible;
    flags.reverse_gravity = def.reverse_gravity;
    entity.flags = flags;
    Ok(entity)
}
