mod area;
mod behavior;
mod collision;
mod effects;
mod entity;
mod eventbox;
mod layer;
mod level;
mod observers;
mod player;
mod quadtree;
mod switching;
mod timer;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::InputEvent;
use crate::assets::ImageAsset;
use crate::geometry::{Rect, Vec2i};
use crate::signal::{Signal, SubscriptionId};

pub use area::{Area, AreaId, LayerSlot, VerticalBounds};
pub use collision::{CollisionHit, CollisionQuery};
pub use entity::{
    Entity, EntityArena, EntityFlags, EntityId, EntityKind, Facing, HeldItem, ItemState,
    PlayerState,
};
pub use eventbox::{EntityAction, EventBox, EventBoxId, EventBoxNotice, EventBoxPhase};
pub use layer::{Layer, LayerRef};
pub use level::{Level, PeriodSwitch, TimePeriod, TimePeriodId};
pub use quadtree::{Query, QuadTree, DEFAULT_QUADTREE_DEPTH};
pub use timer::{TimerId, TimerMode, TimerOwner, TimerQueue};

use effects::FloatEffect;
use observers::{MoveObserver, MoveObservers};

/// Tunables for the simulation. Speeds are in pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub frame_rate: u32,
    pub fall_speed: i32,
    pub move_speed: i32,
    pub jump_speed: i32,
    pub max_jump_height: i32,
    pub hover_time_ms: u32,
    pub max_health: u32,
    pub max_lives: u32,
    pub player_size: [i32; 2],
    pub beam_reach: i32,
    pub held_item_gap: i32,
    pub quadtree_depth: u32,
    pub float_interval_ms: u32,
    pub god_mode: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            fall_speed: 6,
            move_speed: 6,
            jump_speed: 6,
            max_jump_height: 100,
            hover_time_ms: 1000,
            max_health: 3,
            max_lives: 3,
            player_size: [32, 48],
            beam_reach: 40,
            held_item_gap: 2,
            quadtree_depth: DEFAULT_QUADTREE_DEPTH,
            float_interval_ms: 150,
            god_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOutcome {
    PlayerDied,
    GameOver,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaChanged {
    pub from: Option<AreaId>,
    pub to: AreaId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriodChanged {
    pub from: Option<TimePeriodId>,
    pub to: TimePeriodId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabChanged {
    pub item: EntityId,
    pub grabbed: bool,
}

/// One resolved collision pair, emitted after both sides were notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub mover: EntityId,
    pub obstacle: EntityId,
    pub dx: i32,
    pub dy: i32,
    pub mover_rect: Rect,
    pub obstacle_rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopColliding {
    pub obstacle: EntityId,
    pub mover: EntityId,
}

/// Change notifications published by the world. Subscriptions survive level rebuilds
/// when the session hands the signals over to the next world.
#[derive(Debug, Default)]
pub struct WorldSignals {
    pub area_changed: Signal<AreaChanged>,
    pub time_period_changed: Signal<TimePeriodChanged>,
    pub artifact_grabbed: Signal<EntityId>,
    pub grab_changed: Signal<GrabChanged>,
    pub contact: Signal<ContactEvent>,
    pub stop_colliding: Signal<StopColliding>,
    pub button_pressed: Signal<EntityId>,
    pub health_changed: Signal<u32>,
    pub lives_changed: Signal<u32>,
    pub timer_fired: Signal<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum TimerAction {
    Float(EntityId),
    Notify(String),
}

/// The simulation context of one level: entity arena, areas, event boxes, timers and
/// the active area/time-period pointers.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    entities: EntityArena,
    areas: Vec<Area>,
    event_boxes: Vec<eventbox::EventBox>,
    level: Level,
    timers: TimerQueue<TimerAction>,
    observers: MoveObservers,
    floats: HashMap<EntityId, FloatEffect>,
    player: Option<EntityId>,
    outcome: Option<LevelOutcome>,
    ticks: u64,
    pub signals: WorldSignals,
}

impl World {
    pub fn new(level_name: impl Into<String>, config: WorldConfig) -> Self {
        Self::with_signals(level_name, config, WorldSignals::default())
    }

    pub fn with_signals(
        level_name: impl Into<String>,
        config: WorldConfig,
        signals: WorldSignals,
    ) -> Self {
        Self {
            config,
            entities: EntityArena::default(),
            areas: Vec::new(),
            event_boxes: Vec::new(),
            level: Level::new(level_name),
            timers: TimerQueue::default(),
            observers: MoveObservers::default(),
            floats: HashMap::new(),
            player: None,
            outcome: None,
            ticks: 0,
            signals,
        }
    }

    pub fn into_signals(self) -> WorldSignals {
        self.signals
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn frame_ms(&self) -> f32 {
        1000.0 / self.config.frame_rate.max(1) as f32
    }

    pub fn add_time_period(&mut self, name: impl Into<String>) -> TimePeriodId {
        self.level.push_time_period(TimePeriod::new(name))
    }

    /// Creates an area and registers it in `period` under `key`.
    pub fn add_area(&mut self, period: TimePeriodId, key: &str, width: i32, height: i32) -> AreaId {
        let id = AreaId(self.areas.len());
        self.areas
            .push(Area::new(id, key, width, height, self.config.quadtree_depth));
        let Some(time_period) = self.level.time_period_mut(period) else {
            panic!("unknown time period {period:?}");
        };
        time_period.add_area(key, id);
        id
    }

    pub fn add_layer(&mut self, area: AreaId) -> LayerRef {
        self.area_mut(area).push_layer()
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(id.0)
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub(crate) fn area_mut(&mut self, id: AreaId) -> &mut Area {
        let Some(area) = self.areas.get_mut(id.0) else {
            panic!("unknown area {id:?}");
        };
        area
    }

    pub fn active_area(&self) -> Option<&Area> {
        self.level.active_area().and_then(|id| self.area(id))
    }

    pub fn layer(&self, layer: LayerRef) -> Option<&Layer> {
        self.area(layer.area).and_then(|area| area.layer(layer.index))
    }

    pub(crate) fn layer_mut(&mut self, layer: LayerRef) -> Option<&mut Layer> {
        self.areas
            .get_mut(layer.area.0)
            .and_then(|area| area.layer_mut(layer.index))
    }

    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.entities.insert(entity)
    }

    /// Spawns the player-controlled probe, detached, sized from the config.
    pub fn spawn_player(&mut self, position: Vec2i) -> EntityId {
        let [width, height] = self.config.player_size;
        let entity = Entity::new("player", Rect::new(position.x, position.y, width, height))
            .kind(EntityKind::Player(PlayerState {
                health: self.config.max_health,
                lives: self.config.max_lives,
                ..PlayerState::default()
            }))
            .flags(EntityFlags {
                should_check_collisions: true,
                obeys_gravity: true,
                ..EntityFlags::default()
            });
        let id = self.spawn(entity);
        self.player = Some(id);
        id
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn set_player_lives(&mut self, lives: u32) {
        if let Some(state) = self
            .player
            .and_then(|id| self.entities.get_mut(id))
            .and_then(Entity::player_state_mut)
        {
            state.lives = lives;
        }
    }

    /// Detaches and drops `id`. Timers targeting it are not stopped.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        if self.entities.get(id)?.layer.is_some() {
            self.remove_from_layer(&[id]);
        }
        self.observers.forget(id);
        if self.player == Some(id) {
            self.player = None;
        }
        self.entities.remove(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities(&self) -> &EntityArena {
        &self.entities
    }

    pub(crate) fn entity_or_panic(&self, id: EntityId) -> &Entity {
        let Some(entity) = self.entities.get(id) else {
            panic!("unknown entity {id:?}");
        };
        entity
    }

    pub(crate) fn entity_mut_or_panic(&mut self, id: EntityId) -> &mut Entity {
        let Some(entity) = self.entities.get_mut(id) else {
            panic!("unknown entity {id:?}");
        };
        entity
    }

    /// Attaches entities to `layer`: indexes them, subscribes the index to their moves
    /// and adds visible ones to the render set.
    ///
    /// Panics if an entity already belongs to a layer.
    pub fn add_to_layer(&mut self, layer: LayerRef, ids: &[EntityId]) {
        for &id in ids {
            let entity = self.entity_mut_or_panic(id);
            if let Some(current) = entity.layer {
                panic!("entity {id:?} already belongs to {current:?}");
            }
            entity.layer = Some(layer);
            entity.sync_appearance();
            let rect = entity.rect;
            let visible = entity.flags.visible;

            let subscription = self.observers.subscribe(id, MoveObserver::Index(layer));
            let Some(target) = self.layer_mut(layer) else {
                panic!("unknown layer {layer:?}");
            };
            target.quad_tree_mut().insert(id, rect, subscription);
            target.track(id);
            target.set_rendered(id, visible);
            behavior::on_added(self, id, layer);
        }
    }

    /// Detaches entities from their layers. They stay alive in the arena.
    ///
    /// Panics if an entity is not attached.
    pub fn remove_from_layer(&mut self, ids: &[EntityId]) {
        for &id in ids {
            let entity = self.entity_mut_or_panic(id);
            let Some(layer) = entity.layer.take() else {
                panic!("entity {id:?} is not attached to a layer");
            };
            let Some(source) = self.layer_mut(layer) else {
                panic!("unknown layer {layer:?}");
            };
            let subscription = source.quad_tree_mut().remove(id);
            source.untrack(id);
            self.observers.unsubscribe(id, subscription);
            behavior::on_removed(self, id, layer);
        }
    }

    /// Swaps the image an entity is drawn with. Its rect takes the new image's size and
    /// the index follows.
    pub fn set_appearance(&mut self, id: EntityId, image: Option<Arc<ImageAsset>>) {
        let entity = self.entity_mut_or_panic(id);
        entity.appearance = image;
        let before = entity.rect;
        entity.sync_appearance();
        let rect = entity.rect;
        if rect == before {
            return;
        }
        if let Some(layer) = entity.layer {
            if let Some(layer) = self.layer_mut(layer) {
                layer.quad_tree_mut().update(id, rect);
            }
        }
    }

    pub fn set_visible(&mut self, id: EntityId, visible: bool) {
        self.entity_mut_or_panic(id).flags.visible = visible;
        self.update_visibility(id);
    }

    /// Syncs render-set membership with the entity's `visible` flag. Quad-tree
    /// membership is unaffected.
    pub fn update_visibility(&mut self, id: EntityId) {
        let entity = self.entity_or_panic(id);
        let visible = entity.flags.visible;
        if let Some(layer) = entity.layer {
            if let Some(layer) = self.layer_mut(layer) {
                layer.set_rendered(id, visible);
            }
        }
    }

    /// Indexed entities of `layer` whose rect intersects `rect`.
    pub fn entities_in(&self, layer: LayerRef, rect: Rect) -> Vec<EntityId> {
        let Some(target) = self.layer(layer) else {
            return Vec::new();
        };
        target
            .quad_tree()
            .query(Some(rect))
            .filter(|id| {
                self.entities
                    .get(*id)
                    .is_some_and(|entity| entity.rect.intersects(&rect))
            })
            .collect()
    }

    pub fn add_event_box(&mut self, area: AreaId, name: Option<String>) -> EventBoxId {
        let id = EventBoxId(self.event_boxes.len());
        self.event_boxes
            .push(eventbox::EventBox::new(id, area, name));
        self.area_mut(area).register_event_box(id);
        id
    }

    pub fn event_box(&self, id: EventBoxId) -> Option<&EventBox> {
        self.event_boxes.get(id.0)
    }

    pub fn event_box_mut(&mut self, id: EventBoxId) -> Option<&mut EventBox> {
        self.event_boxes.get_mut(id.0)
    }

    /// Subscribes `event_box` to moves of `entity`.
    pub fn watch(&mut self, event_box: EventBoxId, entity: EntityId) -> SubscriptionId {
        assert!(
            event_box.0 < self.event_boxes.len(),
            "unknown event box {event_box:?}"
        );
        self.observers
            .subscribe(entity, MoveObserver::EventBox(event_box))
    }

    pub fn unwatch(&mut self, entity: EntityId, subscription: SubscriptionId) -> bool {
        self.observers.unsubscribe(entity, subscription)
    }

    pub(crate) fn notify_moved(&mut self, id: EntityId, dx: i32, dy: i32) {
        behavior::on_moved(self, id, dx, dy);
        for observer in self.observers.observers_of(id) {
            let Some(rect) = self.entities.get(id).map(|entity| entity.rect) else {
                return;
            };
            match observer {
                MoveObserver::Index(layer) => {
                    if let Some(layer) = self.layer_mut(layer) {
                        layer.quad_tree_mut().update(id, rect);
                    }
                }
                MoveObserver::EventBox(event_box) => self.dispatch_event_box(event_box, id),
            }
        }
    }

    fn dispatch_event_box(&mut self, event_box: EventBoxId, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let Some(layer) = entity.layer else {
            return;
        };
        let rect = entity.rect;
        let Some(target) = self.event_boxes.get_mut(event_box.0) else {
            return;
        };
        if target.area() != layer.area {
            return;
        }

        for notice in target.evaluate(id, rect) {
            let target = &mut self.event_boxes[event_box.0];
            target.notices.emit(&notice);
            let actions = target.actions_for(notice.phase());
            debug!(event_box = event_box.0, notice = ?notice, "event_box_notice");
            for action in actions {
                self.apply_entity_action(id, action);
            }
        }
    }

    fn apply_entity_action(&mut self, subject: EntityId, action: EntityAction) {
        match action {
            EntityAction::SetReverseGravity(enabled) => self.set_reverse_gravity(subject, enabled),
            EntityAction::Show(target) => self.set_visible(target, true),
            EntityAction::Hide(target) => self.set_visible(target, false),
        }
    }

    /// Starts falling if the entity obeys gravity and is not already falling.
    pub fn fall(&mut self, id: EntityId) {
        let fall_speed = self.config.fall_speed;
        let entity = self.entity_mut_or_panic(id);
        if entity.flags.falling {
            return;
        }
        if let Some(state) = entity.player_state_mut() {
            state.jumping = false;
            state.hovering = false;
        }
        if !entity.flags.obeys_gravity {
            return;
        }
        entity.flags.falling = true;
        entity.velocity.y = if entity.flags.reverse_gravity {
            -fall_speed
        } else {
            fall_speed
        };
    }

    pub fn stop_falling(&mut self, id: EntityId) {
        let entity = self.entity_mut_or_panic(id);
        entity.flags.falling = false;
        entity.velocity.y = 0;
    }

    pub fn set_reverse_gravity(&mut self, id: EntityId, enabled: bool) {
        let entity = self.entity_mut_or_panic(id);
        if entity.flags.reverse_gravity == enabled {
            return;
        }
        entity.flags.reverse_gravity = enabled;
        if entity.flags.obeys_gravity {
            entity.flags.falling = false;
            self.fall(id);
        }
    }

    pub fn schedule_notification(
        &mut self,
        interval_ms: u32,
        mode: TimerMode,
        owner: TimerOwner,
        tag: impl Into<String>,
    ) -> TimerId {
        self.timers
            .schedule(interval_ms, mode, owner, TimerAction::Notify(tag.into()))
    }

    pub fn stop_timer(&mut self, id: TimerId) -> bool {
        self.timers.stop(id)
    }

    pub fn is_timer_active(&self, id: TimerId) -> bool {
        self.timers.is_active(id)
    }

    pub fn outcome(&self) -> Option<LevelOutcome> {
        self.outcome
    }

    pub fn take_outcome(&mut self) -> Option<LevelOutcome> {
        self.outcome.take()
    }

    pub(crate) fn set_outcome(&mut self, outcome: LevelOutcome) {
        self.outcome = Some(outcome);
    }

    /// Routes an input event to the player, then offers it to the first event box in
    /// the active area that overlaps the player and has a listener.
    pub fn handle_input(&mut self, event: InputEvent) {
        let Some(player) = self.player else {
            return;
        };
        player::handle_input(self, player, event);

        let Some(rect) = self.entities.get(player).map(|entity| entity.rect) else {
            return;
        };
        let Some(boxes) = self.active_area().map(|area| area.event_boxes().to_vec()) else {
            return;
        };
        for event_box in boxes {
            let target = &mut self.event_boxes[event_box.0];
            if target.overlaps(&rect) && target.fire_event(&event) {
                break;
            }
        }
    }

    /// Advances one fixed step: fires due timers, then ticks every member of the active
    /// area in layer order and insertion order within a layer.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
        let frame_ms = self.frame_ms();
        for (_, action) in self.timers.advance(frame_ms) {
            match action {
                TimerAction::Float(id) => self.step_float(id),
                TimerAction::Notify(tag) => self.signals.timer_fired.emit(&tag),
            }
        }

        let Some(area) = self.level.active_area() else {
            return;
        };
        let order = self.areas[area.0]
            .layers()
            .iter()
            .flat_map(|layer| {
                let layer_ref = LayerRef {
                    area,
                    index: layer.index(),
                };
                layer.members().iter().map(move |id| (layer_ref, *id))
            })
            .collect::<Vec<_>>();

        for (layer, id) in order {
            match self.entities.get(id) {
                Some(entity) if entity.layer == Some(layer) => behavior::tick(self, id),
                Some(_) => {}
                None => warn!(entity = id.0, "tick_target_missing"),
            }
        }
    }
}
