use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Vec2i};

use super::eventbox::EventBoxId;
use super::layer::{Layer, LayerRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaId(pub usize);

/// Standard layers every area starts with, in z-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSlot {
    Default,
    Background,
    #[default]
    Main,
    Foreground,
}

impl LayerSlot {
    pub const ALL: [LayerSlot; 4] = [
        LayerSlot::Default,
        LayerSlot::Background,
        LayerSlot::Main,
        LayerSlot::Foreground,
    ];

    pub const fn index(self) -> usize {
        match self {
            LayerSlot::Default => 0,
            LayerSlot::Background => 1,
            LayerSlot::Main => 2,
            LayerSlot::Foreground => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LayerSlot::Default => "default",
            LayerSlot::Background => "background",
            LayerSlot::Main => "main",
            LayerSlot::Foreground => "foreground",
        }
    }
}

/// Whether movement is clamped at the bottom edge of the area. Left, right and top are
/// always clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalBounds {
    #[default]
    Open,
    Clamped,
}

/// One physical location as it exists in one time period.
#[derive(Debug)]
pub struct Area {
    id: AreaId,
    key: String,
    width: i32,
    height: i32,
    layers: Vec<Layer>,
    event_boxes: Vec<EventBoxId>,
    start_position: Option<Vec2i>,
    vertical_bounds: VerticalBounds,
    quadtree_depth: u32,
}

impl Area {
    pub(crate) fn new(id: AreaId, key: &str, width: i32, height: i32, quadtree_depth: u32) -> Self {
        let bounds = Rect::new(0, 0, width, height);
        let layers = LayerSlot::ALL
            .iter()
            .map(|slot| Layer::new(slot.index(), bounds, quadtree_depth))
            .collect();
        Self {
            id,
            key: key.to_string(),
            width,
            height,
            layers,
            event_boxes: Vec::new(),
            start_position: None,
            vertical_bounds: VerticalBounds::Open,
            quadtree_depth,
        }
    }

    pub fn id(&self) -> AreaId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub(crate) fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn main_layer(&self) -> &Layer {
        &self.layers[LayerSlot::Main.index()]
    }

    pub fn layer_ref(&self, slot: LayerSlot) -> LayerRef {
        LayerRef {
            area: self.id,
            index: slot.index(),
        }
    }

    /// Appends an extra layer above the standard ones.
    pub(crate) fn push_layer(&mut self) -> LayerRef {
        let index = self.layers.len();
        self.layers
            .push(Layer::new(index, self.bounds(), self.quadtree_depth));
        LayerRef {
            area: self.id,
            index,
        }
    }

    pub fn event_boxes(&self) -> &[EventBoxId] {
        &self.event_boxes
    }

    pub(crate) fn register_event_box(&mut self, id: EventBoxId) {
        self.event_boxes.push(id);
    }

    pub fn start_position(&self) -> Option<Vec2i> {
        self.start_position
    }

    pub fn set_start_position(&mut self, position: Vec2i) {
        self.start_position = Some(position);
    }

    pub fn vertical_bounds(&self) -> VerticalBounds {
        self.vertical_bounds
    }

    pub fn set_vertical_bounds(&mut self, bounds: VerticalBounds) {
        self.vertical_bounds = bounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_area_has_standard_layers_sized_to_area() {
        let area = Area::new(AreaId(3), "outside", 800, 600, 4);

        assert_eq!(area.layers().len(), 4);
        for (index, layer) in area.layers().iter().enumerate() {
            assert_eq!(layer.index(), index);
            assert_eq!(layer.quad_tree().region(), Rect::new(0, 0, 800, 600));
        }
        assert_eq!(area.main_layer().index(), LayerSlot::Main.index());
        assert_eq!(
            area.layer_ref(LayerSlot::Foreground),
            LayerRef {
                area: AreaId(3),
                index: 3
            }
        );
        assert_eq!(area.vertical_bounds(), VerticalBounds::Open);
    }

    #[test]
    fn pushed_layer_goes_on_top() {
        let mut area = Area::new(AreaId(0), "default", 100, 100, 2);
        let extra = area.push_layer();
        assert_eq!(extra.index, 4);
        assert_eq!(area.layer(4).expect("extra layer").quad_tree().depth(), 2);
    }
}
