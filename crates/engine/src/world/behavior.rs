//! Per-kind behaviour tables. Every hook the resolver and the world call goes through
//! here and is dispatched on `EntityKind`.

use tracing::info;

use super::collision::CollisionHit;
use super::entity::{EntityId, EntityKind};
use super::layer::LayerRef;
use super::player;
use super::World;

pub(super) fn on_added(world: &mut World, id: EntityId, layer: LayerRef) {
    if world.entity_or_panic(id).is_player() {
        player::on_added(world, id, layer);
    }
}

pub(super) fn on_removed(world: &mut World, id: EntityId, layer: LayerRef) {
    if world.entity_or_panic(id).is_player() {
        player::on_removed(world, id, layer);
    }
}

pub(super) fn on_moved(world: &mut World, id: EntityId, dx: i32, dy: i32) {
    if world.entity(id).is_some_and(|entity| entity.is_player()) {
        player::on_moved(world, id, dx, dy);
    }
}

/// Applies velocity through a checked move.
pub(super) fn tick(world: &mut World, id: EntityId) {
    if world.entity_or_panic(id).is_player() {
        player::tick(world, id);
    }
    let Some(velocity) = world.entity(id).map(|entity| entity.velocity) else {
        return;
    };
    if !velocity.is_zero() {
        world.move_by(id, velocity.x, velocity.y, true);
    }
}

/// Whether `mover` should be pushed flush against `obstacle` on contact.
pub(super) fn should_snap(world: &World, mover: EntityId, obstacle: EntityId) -> bool {
    if matches!(world.entity_or_panic(obstacle).kind, EntityKind::Marker) {
        return false;
    }
    let holding = world
        .entity_or_panic(mover)
        .player_state()
        .and_then(|state| state.held)
        .is_some_and(|held| held.id == obstacle);
    !holding
}

/// Mover-side reaction to a resolved collision.
pub(super) fn on_collision(world: &mut World, id: EntityId, hit: &CollisionHit, dx: i32, dy: i32) {
    if world.entity_or_panic(id).is_player() {
        player::on_collision(world, id, hit, dx, dy);
    } else {
        land(world, id, dy);
    }
}

/// Default reaction: a falling entity stops falling on a vertical contact.
pub(super) fn land(world: &mut World, id: EntityId, dy: i32) {
    let entity = world.entity_mut_or_panic(id);
    if dy != 0 && entity.flags.obeys_gravity && entity.flags.falling {
        entity.flags.falling = false;
    }
}

/// Obstacle-side reaction to a resolved collision. `hit` is seen from the obstacle:
/// `other` is the mover and `other_rect` the mover's matched part.
pub(super) fn handle_collision(
    world: &mut World,
    obstacle: EntityId,
    hit: &CollisionHit,
    _dx: i32,
    dy: i32,
) {
    if !world.entity_or_panic(hit.other).is_player() || dy <= 0 {
        return;
    }
    let entity = world.entity_mut_or_panic(obstacle);
    let rect = entity.rect;

    let mut newly_pressed = false;
    let mut swap = None;
    match &mut entity.kind {
        EntityKind::Button { pressed } if !*pressed => {
            *pressed = true;
            newly_pressed = true;
        }
        EntityKind::Shelter {
            interior, inside, ..
        } if !*inside && rect.contains(&hit.other_rect) => {
            *inside = true;
            swap = Some(interior.clone());
        }
        _ => {}
    }

    if let Some(image) = swap {
        world.set_appearance(obstacle, image);
    }
    if newly_pressed {
        info!(button = obstacle.0, "button_pressed");
        world.signals.button_pressed.emit(&obstacle);
    }
}

pub(super) fn handle_stop_colliding(world: &mut World, obstacle: EntityId, mover: EntityId) {
    let Some(mover_entity) = world.entity(mover) else {
        return;
    };
    let mover_is_player = mover_entity.is_player();
    let mover_rect = mover_entity.rect;
    let Some(entity) = world.entity_mut(obstacle) else {
        return;
    };
    let rect = entity.rect;
    let mut swap = None;
    if let EntityKind::Shelter {
        exterior, inside, ..
    } = &mut entity.kind
    {
        if mover_is_player && *inside && !rect.contains(&mover_rect) {
            *inside = false;
            swap = Some(exterior.clone());
        }
    }
    if let Some(image) = swap {
        world.set_appearance(obstacle, image);
    }
}

/// Activation by the player's trigger key.
pub(super) fn trigger(world: &mut World, target: EntityId, activator: EntityId) {
    if let EntityKind::Door { destination } = world.entity_or_panic(target).kind {
        let Some(destination) = destination else {
            panic!("door {target:?} has no destination");
        };
        player::use_door(world, activator, target, destination);
    }
}
