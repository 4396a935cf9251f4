use crate::geometry::Rect;

use super::area::AreaId;
use super::entity::EntityId;
use super::quadtree::{Query, QuadTree};

/// Address of a layer: owning area plus z-index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerRef {
    pub area: AreaId,
    pub index: usize,
}

/// Z-ordered bucket of entities within an area, indexed by its own quad-tree.
#[derive(Debug)]
pub struct Layer {
    index: usize,
    quad_tree: QuadTree,
    members: Vec<EntityId>,
    rendered: Vec<EntityId>,
}

impl Layer {
    pub fn new(index: usize, region: Rect, quadtree_depth: u32) -> Self {
        Self {
            index,
            quad_tree: QuadTree::with_depth(region, quadtree_depth),
            members: Vec::new(),
            rendered: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn quad_tree(&self) -> &QuadTree {
        &self.quad_tree
    }

    pub(crate) fn quad_tree_mut(&mut self) -> &mut QuadTree {
        &mut self.quad_tree
    }

    /// Members in the order they were added.
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn render_set(&self) -> &[EntityId] {
        &self.rendered
    }

    pub fn is_rendered(&self, id: EntityId) -> bool {
        self.rendered.contains(&id)
    }

    pub fn iter(&self) -> Query<'_> {
        self.quad_tree.query(None)
    }

    pub(crate) fn track(&mut self, id: EntityId) {
        self.members.push(id);
    }

    pub(crate) fn untrack(&mut self, id: EntityId) {
        self.members.retain(|member| *member != id);
        self.rendered.retain(|member| *member != id);
    }

    pub(crate) fn set_rendered(&mut self, id: EntityId, rendered: bool) {
        let present = self.rendered.contains(&id);
        if rendered && !present {
            self.rendered.push(id);
        } else if !rendered && present {
            self.rendered.retain(|member| *member != id);
        }
    }
}
