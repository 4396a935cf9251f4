use std::sync::Arc;

use tracing::trace;

use crate::geometry::Rect;
use crate::mask::{overlap_region, PixelMask};

use super::area::VerticalBounds;
use super::behavior;
use super::entity::EntityId;
use super::layer::LayerRef;
use super::player;
use super::{ContactEvent, StopColliding, World};

/// A collision between the querying entity and `other`.
///
/// `self_rect` is the querying entity's sub-rect that matched (its rect after snapping
/// when the entity's own rect matched); `other_rect` is the
/// obstacle's matched sub-rect, or the bounding box of the mask overlap when pixel
/// collisions refined the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionHit {
    pub other: EntityId,
    pub self_rect: Rect,
    pub other_rect: Rect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionQuery {
    /// Skip the `collidable` / `should_check_collisions` gates.
    pub ignore_collidable: bool,
    /// Test against this layer's index instead of the entity's own layer.
    pub target: Option<LayerRef>,
}

type Part = (Rect, Option<Arc<PixelMask>>);

impl World {
    /// Moves by `(dx, dy)`. With `check`, the horizontal and vertical components are
    /// applied and resolved one after the other, and collisions are dispatched.
    pub fn move_by(&mut self, id: EntityId, dx: i32, dy: i32, check: bool) {
        if dx == 0 && dy == 0 {
            return;
        }
        let previous = if check {
            Some(std::mem::take(&mut self.entity_mut_or_panic(id).colliding))
        } else {
            None
        };

        let mut hits = Vec::new();
        if dx != 0 {
            self.move_axis(id, dx, 0, check, &mut hits);
        }
        if dy != 0 {
            self.move_axis(id, 0, dy, check, &mut hits);
        }

        if let Some(previous) = previous {
            if let Some(entity) = self.entities.get_mut(id) {
                entity.colliding = hits.clone();
            }
            for stale in previous.into_iter().filter(|other| !hits.contains(other)) {
                behavior::handle_stop_colliding(self, stale, id);
                self.signals.stop_colliding.emit(&StopColliding {
                    obstacle: stale,
                    mover: id,
                });
            }
        }

        self.notify_moved(id, dx, dy);
    }

    /// Places the top-left corner at `(x, y)`.
    pub fn move_to(&mut self, id: EntityId, x: i32, y: i32, check: bool) {
        let rect = self.entity_or_panic(id).rect;
        self.move_by(id, x - rect.x, y - rect.y, check);
    }

    /// Unchecked relative move.
    pub fn teleport_by(&mut self, id: EntityId, dx: i32, dy: i32) {
        self.move_by(id, dx, dy, false);
    }

    fn move_axis(&mut self, id: EntityId, dx: i32, dy: i32, check: bool, hits: &mut Vec<EntityId>) {
        let entity = self.entity_mut_or_panic(id);
        entity.rect.translate(dx, dy);
        let Some(layer) = entity.layer else {
            return;
        };
        let (width, height, bounds) = match self.area(layer.area) {
            Some(area) => {
                let (width, height) = area.size();
                (width, height, area.vertical_bounds())
            }
            None => return,
        };
        let rect = &mut self.entity_mut_or_panic(id).rect;
        if rect.left() < 0 {
            rect.set_left(0);
        } else if rect.right() > width {
            rect.set_right(width);
        }
        if rect.top() < 0 {
            rect.set_top(0);
        } else if bounds == VerticalBounds::Clamped && rect.bottom() > height {
            rect.set_bottom(height);
        }

        if check {
            self.resolve_collisions(id, layer, dx, dy, hits);
        }
    }

    fn resolve_collisions(
        &mut self,
        id: EntityId,
        layer: LayerRef,
        dx: i32,
        dy: i32,
        hits: &mut Vec<EntityId>,
    ) {
        if !self.entity_or_panic(id).flags.should_check_collisions {
            return;
        }
        let mut resolved = Vec::new();
        // Each obstacle resolves at most once; the broad phase reruns whenever a
        // reaction moves the mover.
        loop {
            let Some(probe) = bounding_rect(&self.collision_parts(id)) else {
                return;
            };
            let candidates = match self.layer(layer) {
                Some(target) => target.quad_tree().query(Some(probe)).collect::<Vec<_>>(),
                None => return,
            };
            let before = self.entity_or_panic(id).rect;
            let mut displaced = false;

            for other in candidates {
                if resolved.contains(&other) {
                    continue;
                }
                let Some(mut hit) = self.test_pair(id, other, layer.index, false) else {
                    continue;
                };
                resolved.push(other);
                if hit.self_rect == self.entity_or_panic(id).rect
                    && behavior::should_snap(self, id, other)
                {
                    self.position_beside(id, hit.other_rect, dx, dy);
                    hit.self_rect = self.entity_or_panic(id).rect;
                }
                let seen_by_obstacle = CollisionHit {
                    other: id,
                    self_rect: hit.other_rect,
                    other_rect: hit.self_rect,
                };
                behavior::handle_collision(self, other, &seen_by_obstacle, dx, dy);
                behavior::on_collision(self, id, &hit, dx, dy);
                trace!(mover = id.0, obstacle = other.0, dx, dy, "collision");
                self.signals.contact.emit(&ContactEvent {
                    mover: id,
                    obstacle: other,
                    dx,
                    dy,
                    mover_rect: hit.self_rect,
                    obstacle_rect: hit.other_rect,
                });
                if !hits.contains(&other) {
                    hits.push(other);
                }
                let Some(entity) = self.entities.get(id) else {
                    return;
                };
                if entity.layer != Some(layer) {
                    return;
                }
                if entity.rect != before {
                    displaced = true;
                    break;
                }
            }

            if !displaced {
                return;
            }
        }
    }

    fn position_beside(&mut self, id: EntityId, obstacle: Rect, dx: i32, dy: i32) {
        let rect = &mut self.entity_mut_or_panic(id).rect;
        if dy < 0 {
            rect.set_top(obstacle.bottom());
        } else if dy > 0 {
            rect.set_bottom(obstacle.top());
        } else if dx < 0 {
            rect.set_left(obstacle.right());
        } else if dx > 0 {
            rect.set_right(obstacle.left());
        }
    }

    /// Every collision of `id` at its current position.
    pub fn collisions(&self, id: EntityId, query: CollisionQuery) -> Vec<CollisionHit> {
        let Some(entity) = self.entities.get(id) else {
            return Vec::new();
        };
        if !query.ignore_collidable && !entity.flags.should_check_collisions {
            return Vec::new();
        }
        let Some(layer) = query.target.or(entity.layer) else {
            return Vec::new();
        };
        let Some(probe) = bounding_rect(&self.collision_parts(id)) else {
            return Vec::new();
        };
        let Some(target) = self.layer(layer) else {
            return Vec::new();
        };
        target
            .quad_tree()
            .query(Some(probe))
            .filter_map(|other| self.test_pair(id, other, layer.index, query.ignore_collidable))
            .collect()
    }

    /// First entity in `layer` that would block `id` at its current position.
    pub fn first_blocker(&self, id: EntityId, layer: LayerRef) -> Option<EntityId> {
        self.collisions(
            id,
            CollisionQuery {
                ignore_collidable: false,
                target: Some(layer),
            },
        )
        .first()
        .map(|hit| hit.other)
    }

    /// Whether `id` could stand at its current position in `layer`.
    pub fn can_occupy(&self, id: EntityId, layer: LayerRef) -> bool {
        self.first_blocker(id, layer).is_none()
    }

    /// Collision parts in world coordinates: the entity's own rects plus, for a player,
    /// the rect of the item it carries.
    pub(crate) fn collision_parts(&self, id: EntityId) -> Vec<Part> {
        let entity = self.entity_or_panic(id);
        let mut parts = entity.own_parts();
        if let Some(held) = entity.player_state().and_then(|state| state.held) {
            if let Some(item) = self.entities.get(held.id) {
                let rect = player::held_item_rect(entity, item, self.config.held_item_gap);
                let mask = item.appearance.as_ref().map(|image| Arc::clone(&image.mask));
                parts.push((rect, mask));
            }
        }
        parts
    }

    fn test_pair(
        &self,
        id: EntityId,
        other: EntityId,
        layer_index: usize,
        ignore_collidable: bool,
    ) -> Option<CollisionHit> {
        if id == other {
            return None;
        }
        let left = self.entities.get(id)?;
        let right = self.entities.get(other)?;
        if right.layer?.index != layer_index {
            return None;
        }
        if !ignore_collidable
            && (!left.flags.collidable
                || !right.flags.collidable
                || (!left.flags.should_check_collisions && !right.flags.should_check_collisions))
        {
            return None;
        }

        let pixel = left.flags.use_pixel_collisions || right.flags.use_pixel_collisions;
        let right_parts = self.collision_parts(other);
        for (self_rect, self_mask) in self.collision_parts(id) {
            for (other_rect, other_mask) in &right_parts {
                if !self_rect.intersects(other_rect) {
                    continue;
                }
                if !pixel {
                    return Some(CollisionHit {
                        other,
                        self_rect,
                        other_rect: *other_rect,
                    });
                }
                if let Some(overlap) = overlap_region(
                    self_rect,
                    self_mask.as_deref(),
                    *other_rect,
                    other_mask.as_deref(),
                ) {
                    return Some(CollisionHit {
                        other,
                        self_rect,
                        other_rect: overlap,
                    });
                }
            }
        }
        None
    }
}

fn bounding_rect(parts: &[Part]) -> Option<Rect> {
    parts
        .iter()
        .map(|(rect, _)| *rect)
        .reduce(|acc, rect| acc.union(&rect))
}
