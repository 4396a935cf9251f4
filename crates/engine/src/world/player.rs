//! The player-controlled probe: controls, jump/hover, the tractor beam and hazards.

use tracing::{debug, info};

use crate::app::{InputAction, InputEvent, KeyState};
use crate::geometry::{Rect, Vec2i};

use super::behavior;
use super::collision::{CollisionHit, CollisionQuery};
use super::entity::{Entity, EntityId, EntityKind, Facing, HeldItem, ItemState};
use super::layer::LayerRef;
use super::{GrabChanged, LevelOutcome, World};

/// Where a carried item sits: vertically centred on the player, `gap` pixels in front.
pub(super) fn held_item_rect(player: &Entity, item: &Entity, gap: i32) -> Rect {
    let y = player.rect.top() + (player.rect.height - item.rect.height) / 2;
    let x = match player.facing {
        Facing::Right => player.rect.right() + gap,
        Facing::Left => player.rect.left() - gap - item.rect.width,
    };
    Rect::new(x, y, item.rect.width, item.rect.height)
}

fn held(world: &World, id: EntityId) -> Option<HeldItem> {
    world
        .entity(id)
        .and_then(Entity::player_state)
        .and_then(|state| state.held)
}

pub(super) fn on_added(world: &mut World, id: EntityId, layer: LayerRef) {
    let Some(held) = held(world, id) else {
        return;
    };
    if world.entity(held.id).is_some_and(|item| item.layer.is_none()) {
        world.add_to_layer(layer, &[held.id]);
    }
}

pub(super) fn on_removed(world: &mut World, id: EntityId, _layer: LayerRef) {
    let Some(held) = held(world, id) else {
        return;
    };
    if world.entity(held.id).is_some_and(|item| item.layer.is_some()) {
        world.remove_from_layer(&[held.id]);
    }
}

pub(super) fn on_moved(world: &mut World, id: EntityId, _dx: i32, _dy: i32) {
    let god_mode = world.config.god_mode;
    let max_jump_height = world.config.max_jump_height;
    let entity = world.entity_mut_or_panic(id);
    let rect = entity.rect;
    let reverse = entity.flags.reverse_gravity;
    let Some(state) = entity.player_state_mut() else {
        return;
    };
    if state.last_safe_spot.is_none() {
        state.last_safe_spot = Some(rect.top_left());
    }
    let rise = if reverse {
        rect.y - state.jump_origin_y
    } else {
        state.jump_origin_y - rect.y
    };
    let reached_apex = state.jumping && !god_mode && rise >= max_jump_height;
    let held = state.held;

    if reached_apex {
        hover(world, id);
    }
    if let Some(held) = held {
        place_held_item(world, id, held.id);
    }
}

/// Counts down the hover and starts falling once it runs out.
pub(super) fn tick(world: &mut World, id: EntityId) {
    let frame_ms = world.frame_ms();
    let hover_time_ms = world.config.hover_time_ms as f32;
    let Some(state) = world.entity_mut_or_panic(id).player_state_mut() else {
        return;
    };
    if !state.hovering {
        return;
    }
    state.hover_elapsed_ms += frame_ms;
    if state.hover_elapsed_ms >= hover_time_ms {
        world.fall(id);
    }
}

pub(super) fn handle_input(world: &mut World, id: EntityId, event: InputEvent) {
    let blocked = world
        .entity(id)
        .and_then(Entity::player_state)
        .map_or(true, |state| state.block_events);
    if blocked {
        return;
    }

    match (event.action, event.state) {
        (InputAction::MoveLeft, KeyState::Pressed) => walk(world, id, Facing::Left),
        (InputAction::MoveRight, KeyState::Pressed) => walk(world, id, Facing::Right),
        (InputAction::MoveLeft, KeyState::Released) => {
            let entity = world.entity_mut_or_panic(id);
            if entity.velocity.x < 0 {
                entity.velocity.x = 0;
            }
        }
        (InputAction::MoveRight, KeyState::Released) => {
            let entity = world.entity_mut_or_panic(id);
            if entity.velocity.x > 0 {
                entity.velocity.x = 0;
            }
        }
        (InputAction::Jump, KeyState::Pressed) => jump(world, id),
        (InputAction::Jump, KeyState::Released) => world.fall(id),
        (InputAction::Grab, KeyState::Pressed) => grab_in_front(world, id),
        (InputAction::Grab, KeyState::Released) => release(world, id),
        (InputAction::Trigger, KeyState::Pressed) => trigger_overlapping(world, id),
        _ => {}
    }
}

fn walk(world: &mut World, id: EntityId, facing: Facing) {
    let speed = world.config.move_speed;
    let entity = world.entity_mut_or_panic(id);
    entity.velocity.x = match facing {
        Facing::Left => -speed,
        Facing::Right => speed,
    };
    if entity.facing == facing {
        return;
    }
    entity.facing = facing;
    if let Some(held) = held(world, id) {
        place_held_item(world, id, held.id);
    }
}

fn jump(world: &mut World, id: EntityId) {
    let god_mode = world.config.god_mode;
    let jump_speed = world.config.jump_speed;
    let entity = world.entity_mut_or_panic(id);
    let jumping = entity.player_state().is_some_and(|state| state.jumping);
    if (entity.flags.falling && !god_mode) || jumping {
        return;
    }

    entity.flags.falling = false;
    entity.velocity.y = if entity.flags.reverse_gravity {
        jump_speed
    } else {
        -jump_speed
    };
    let origin = entity.rect.y;
    if let Some(state) = entity.player_state_mut() {
        state.jump_origin_y = origin;
        state.jumping = true;
        state.hovering = false;
    }
}

fn hover(world: &mut World, id: EntityId) {
    let entity = world.entity_mut_or_panic(id);
    if entity.player_state().map_or(true, |state| state.hovering) {
        return;
    }
    entity.velocity.y = 0;
    if let Some(state) = entity.player_state_mut() {
        state.jumping = false;
        state.hovering = true;
        state.hover_elapsed_ms = 0.0;
    }
}

fn place_held_item(world: &mut World, id: EntityId, item: EntityId) {
    let gap = world.config.held_item_gap;
    let player = world.entity_or_panic(id);
    let Some(item_entity) = world.entity(item) else {
        return;
    };
    let target = held_item_rect(player, item_entity, gap);
    world.move_to(item, target.x, target.y, false);
}

fn grab_in_front(world: &mut World, id: EntityId) {
    if held(world, id).is_some() {
        return;
    }
    let reach = world.config.beam_reach;
    let entity = world.entity_or_panic(id);
    let Some(layer) = entity.layer else {
        return;
    };
    let rect = entity.rect;
    let beam = match entity.facing {
        Facing::Right => Rect::new(rect.right(), rect.y, reach, rect.height),
        Facing::Left => Rect::new(rect.left() - reach, rect.y, reach, rect.height),
    };

    let target = world.entities_in(layer, beam).into_iter().find(|other| {
        *other != id
            && world
                .entity(*other)
                .is_some_and(|candidate| candidate.flags.grabbable && !candidate.flags.grabbed)
    });
    if let Some(item) = target {
        grab(world, id, item);
    }
}

/// Takes `item` into the tractor beam. Grabbing an artifact completes the level.
fn grab(world: &mut World, id: EntityId, item: EntityId) {
    let entity = world.entity_mut_or_panic(item);
    let obeyed_gravity = entity.flags.obeys_gravity;
    entity.flags.falling = false;
    entity.velocity.y = 0;
    entity.flags.obeys_gravity = false;
    entity.flags.collidable = false;
    entity.flags.grabbed = true;
    let artifact = matches!(entity.kind, EntityKind::Item(ItemState { artifact: true }));

    if let Some(state) = world.entity_mut_or_panic(id).player_state_mut() {
        state.held = Some(HeldItem {
            id: item,
            obeyed_gravity,
        });
    }
    world.stop_float(item);
    place_held_item(world, id, item);
    world
        .signals
        .grab_changed
        .emit(&GrabChanged { item, grabbed: true });
    debug!(item = item.0, "item_grabbed");

    if artifact {
        complete_level(world, id, item);
    }
}

fn complete_level(world: &mut World, id: EntityId, artifact: EntityId) {
    world.level.mark_completed();
    world.set_outcome(LevelOutcome::Completed);
    let entity = world.entity_mut_or_panic(id);
    entity.velocity = Vec2i::ZERO;
    if let Some(state) = entity.player_state_mut() {
        state.block_events = true;
    }
    world.fall(id);
    world.signals.artifact_grabbed.emit(&artifact);
    info!(level = world.level.name(), artifact = artifact.0, "artifact_grabbed");
}

/// Drops the carried item, restoring its gravity.
fn release(world: &mut World, id: EntityId) {
    let Some(held) = world
        .entity_mut_or_panic(id)
        .player_state_mut()
        .and_then(|state| state.held.take())
    else {
        return;
    };
    let Some(item) = world.entity_mut(held.id) else {
        return;
    };
    item.flags.obeys_gravity = held.obeyed_gravity;
    item.flags.collidable = true;
    item.flags.grabbed = false;
    world.fall(held.id);
    world.signals.grab_changed.emit(&GrabChanged {
        item: held.id,
        grabbed: false,
    });
    debug!(item = held.id.0, "item_released");
}

fn trigger_overlapping(world: &mut World, id: EntityId) {
    let start = world.entity_or_panic(id).rect;
    let hits = world.collisions(
        id,
        CollisionQuery {
            ignore_collidable: true,
            target: None,
        },
    );
    for hit in hits {
        behavior::trigger(world, hit.other, id);
        if world.entity(id).map(|entity| entity.rect) != Some(start) {
            break;
        }
    }
}

pub(super) fn on_collision(world: &mut World, id: EntityId, hit: &CollisionHit, dx: i32, dy: i32) {
    let god_mode = world.config.god_mode;
    let entity = world.entity_or_panic(id);
    let rect = entity.rect;
    let reverse = entity.flags.reverse_gravity;
    let lethal = world
        .entity(hit.other)
        .is_some_and(|other| other.flags.lethal);
    if lethal && !god_mode && hit.self_rect == rect {
        on_hit(world, id);
        return;
    }

    let Some(state) = world.entity_mut_or_panic(id).player_state_mut() else {
        return;
    };
    state.last_safe_spot = Some(rect.top_left());
    let jumping = state.jumping;
    let held = state.held;

    if let Some(held) = held {
        if hit.self_rect != rect {
            push_back(world, id, held.id, hit.other_rect, dx, dy);
        }
    }

    let against_gravity = if reverse { dy > 0 } else { dy < 0 };
    if jumping && against_gravity {
        world.fall(id);
    } else {
        behavior::land(world, id, dy);
    }
}

/// Moves the player so that its carried item sits flush against `obstacle`.
fn push_back(world: &mut World, id: EntityId, item: EntityId, obstacle: Rect, dx: i32, dy: i32) {
    let gap = world.config.held_item_gap;
    let player = world.entity_or_panic(id);
    let Some(item_entity) = world.entity(item) else {
        return;
    };
    let carried = held_item_rect(player, item_entity, gap);
    let rect = player.rect;

    let (x, y) = if dy > 0 {
        (rect.x, rect.y - (carried.bottom() - obstacle.top()))
    } else if dy < 0 {
        (rect.x, rect.y + (obstacle.bottom() - carried.top()))
    } else if dx != 0 {
        let x = match player.facing {
            Facing::Left => obstacle.right() + (rect.left() - carried.left()),
            Facing::Right => obstacle.left() - (carried.right() - rect.left()),
        };
        (x, rect.y)
    } else {
        return;
    };
    world.move_to(id, x, y, false);
}

fn on_hit(world: &mut World, id: EntityId) {
    let Some(state) = world.entity_mut_or_panic(id).player_state_mut() else {
        return;
    };
    state.health = state.health.saturating_sub(1);
    let health = state.health;
    let safe_spot = state.last_safe_spot;
    world.signals.health_changed.emit(&health);
    info!(health, "player_hit");

    if health == 0 {
        on_dead(world, id);
        return;
    }
    if let Some(spot) = safe_spot {
        world.move_to(id, spot.x, spot.y, false);
    }
    let entity = world.entity_mut_or_panic(id);
    entity.velocity = Vec2i::ZERO;
    entity.flags.falling = false;
    world.fall(id);
}

fn on_dead(world: &mut World, id: EntityId) {
    let max_health = world.config.max_health;
    let entity = world.entity_mut_or_panic(id);
    entity.velocity = Vec2i::ZERO;
    let Some(state) = entity.player_state_mut() else {
        return;
    };
    state.lives = state.lives.saturating_sub(1);
    state.block_events = true;
    let lives = state.lives;
    if lives > 0 {
        state.health = max_health;
    }
    world.signals.lives_changed.emit(&lives);

    if lives == 0 {
        world.set_outcome(LevelOutcome::GameOver);
        info!("game_over");
    } else {
        world.signals.health_changed.emit(&max_health);
        world.set_outcome(LevelOutcome::PlayerDied);
        info!(lives, "player_died");
    }
}

/// Teleports `activator` to stand at the bottom centre of `destination`, switching areas
/// when the destination lives elsewhere.
pub(super) fn use_door(world: &mut World, activator: EntityId, door: EntityId, destination: EntityId) {
    let Some(target) = world.entity(destination) else {
        panic!("door {door:?} leads to unknown entity {destination:?}");
    };
    let target_rect = target.rect;
    let target_area = target.layer.map(|layer| layer.area);
    let current_area = world.entity_or_panic(activator).layer.map(|layer| layer.area);

    if let Some(area) = target_area {
        if current_area != Some(area) && world.player == Some(activator) {
            world.switch_area(area);
        }
    }

    let rect = world.entity_or_panic(activator).rect;
    let x = target_rect.x + (target_rect.width - rect.width) / 2;
    let y = target_rect.bottom() - rect.height;
    world.move_to(activator, x, y, false);
    info!(door = door.0, destination = destination.0, x, y, "door_used");
}
