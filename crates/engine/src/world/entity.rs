use std::sync::Arc;

use crate::assets::ImageAsset;
use crate::geometry::{Rect, Vec2i};
use crate::mask::PixelMask;

use super::layer::LayerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityFlags {
    pub collidable: bool,
    pub should_check_collisions: bool,
    pub obeys_gravity: bool,
    pub falling: bool,
    pub lethal: bool,
    pub grabbable: bool,
    pub grabbed: bool,
    pub reverse_gravity: bool,
    pub use_pixel_collisions: bool,
    pub visible: bool,
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self {
            collidable: true,
            should_check_collisions: false,
            obeys_gravity: false,
            falling: false,
            lethal: false,
            grabbable: false,
            grabbed: false,
            reverse_gravity: false,
            use_pixel_collisions: false,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerState {
    pub jumping: bool,
    pub hovering: bool,
    pub hover_elapsed_ms: f32,
    pub jump_origin_y: i32,
    pub health: u32,
    pub lives: u32,
    pub last_safe_spot: Option<Vec2i>,
    pub held: Option<HeldItem>,
    pub block_events: bool,
}

/// Item carried by the player's tractor beam, with the gravity setting it had before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldItem {
    pub id: EntityId,
    pub obeyed_gravity: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemState {
    pub artifact: bool,
}

/// Behaviour selector for an entity. Dispatch lives in the world's behaviour tables.
#[derive(Debug, Clone, Default)]
pub enum EntityKind {
    #[default]
    Scenery,
    Player(PlayerState),
    Item(ItemState),
    Door {
        destination: Option<EntityId>,
    },
    Button {
        pressed: bool,
    },
    Shelter {
        exterior: Option<Arc<ImageAsset>>,
        interior: Option<Arc<ImageAsset>>,
        inside: bool,
    },
    Marker,
}

/// A collidable or decorative object placed in a layer.
///
/// `collision_shape` holds sub-rects relative to the entity's top-left corner; an empty
/// shape means the entity collides with its own bounding rect.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub(crate) rect: Rect,
    pub velocity: Vec2i,
    pub flags: EntityFlags,
    pub kind: EntityKind,
    pub facing: Facing,
    pub(crate) collision_shape: Vec<Rect>,
    pub(crate) shape_masks: Vec<Option<Arc<PixelMask>>>,
    pub(crate) appearance: Option<Arc<ImageAsset>>,
    pub(crate) layer: Option<LayerRef>,
    pub(crate) colliding: Vec<EntityId>,
}

impl Entity {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
            velocity: Vec2i::ZERO,
            flags: EntityFlags::default(),
            kind: EntityKind::Scenery,
            facing: Facing::Right,
            collision_shape: Vec::new(),
            shape_masks: Vec::new(),
            appearance: None,
            layer: None,
            colliding: Vec::new(),
        }
    }

    /// Entity sized by its image; the image's alpha mask backs pixel collisions.
    pub fn with_image(name: impl Into<String>, position: Vec2i, image: Arc<ImageAsset>) -> Self {
        let rect = Rect::new(
            position.x,
            position.y,
            image.width as i32,
            image.height as i32,
        );
        let mut entity = Self::new(name, rect);
        entity.appearance = Some(image);
        entity
    }

    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn flags(mut self, flags: EntityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn collision_shape(mut self, shape: Vec<Rect>) -> Self {
        self.shape_masks = vec![None; shape.len()];
        self.collision_shape = shape;
        self
    }

    pub fn shape_mask(mut self, index: usize, mask: PixelMask) -> Self {
        assert!(
            index < self.collision_shape.len(),
            "shape mask {index} has no matching collision rect"
        );
        self.shape_masks[index] = Some(Arc::new(mask));
        self
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn layer(&self) -> Option<LayerRef> {
        self.layer
    }

    pub fn colliding_with(&self) -> &[EntityId] {
        &self.colliding
    }

    pub fn appearance(&self) -> Option<&Arc<ImageAsset>> {
        self.appearance.as_ref()
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    /// Resizes the rect to the current image, keeping the top-left corner.
    pub(crate) fn sync_appearance(&mut self) {
        if let Some(image) = &self.appearance {
            self.rect.width = image.width as i32;
            self.rect.height = image.height as i32;
        }
    }

    /// Collision rects in world coordinates paired with their optional masks.
    pub(crate) fn own_parts(&self) -> Vec<(Rect, Option<Arc<PixelMask>>)> {
        if self.collision_shape.is_empty() {
            let mask = self.appearance.as_ref().map(|image| Arc::clone(&image.mask));
            return vec![(self.rect, mask)];
        }
        self.collision_shape
            .iter()
            .zip(&self.shape_masks)
            .map(|(offset, mask)| (offset.translated(self.rect.x, self.rect.y), mask.clone()))
            .collect()
    }
}

/// Slot storage for entities; ids are never reused.
#[derive(Debug, Default)]
pub struct EntityArena {
    slots: Vec<Option<Entity>>,
}

impl EntityArena {
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.slots.len() as u64);
        self.slots.push(Some(entity));
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.slots.get_mut(id.0 as usize).and_then(Option::take)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entity| (EntityId(index as u64), entity)))
    }
}
