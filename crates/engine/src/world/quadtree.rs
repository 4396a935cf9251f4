use std::collections::{HashMap, HashSet};

use crate::geometry::Rect;
use crate::signal::SubscriptionId;

use super::entity::EntityId;

pub const DEFAULT_QUADTREE_DEPTH: u32 = 4;

type NodeIndex = usize;

const NW: usize = 0;
const NE: usize = 1;
const SW: usize = 2;
const SE: usize = 3;

#[derive(Debug)]
struct QuadNode {
    region: Rect,
    depth: u32,
    children: Option<[NodeIndex; 4]>,
    entries: Vec<EntityId>,
}

#[derive(Debug)]
struct Placement {
    nodes: Vec<NodeIndex>,
    subscription: SubscriptionId,
}

/// Region quad-tree used as the broad phase of a layer.
///
/// An entity is stored in every quadrant subtree its rect overlaps, or in the node
/// itself when it overlaps all four quadrants or the node is a leaf. The root keeps the
/// set of nodes holding each entity together with the move subscription that keeps the
/// placement current.
#[derive(Debug)]
pub struct QuadTree {
    nodes: Vec<QuadNode>,
    placements: HashMap<EntityId, Placement>,
}

impl QuadTree {
    pub fn new(region: Rect) -> Self {
        Self::with_depth(region, DEFAULT_QUADTREE_DEPTH)
    }

    /// `depth` counts tree levels including the root; a depth of 1 is a single leaf.
    pub fn with_depth(region: Rect, depth: u32) -> Self {
        assert!(depth >= 1, "quad-tree depth must be at least 1");
        let mut tree = Self {
            nodes: Vec::new(),
            placements: HashMap::new(),
        };
        tree.build_node(region, depth - 1);
        tree
    }

    fn build_node(&mut self, region: Rect, depth: u32) -> NodeIndex {
        let index = self.nodes.len();
        self.nodes.push(QuadNode {
            region,
            depth,
            children: None,
            entries: Vec::new(),
        });
        if depth > 0 {
            let half_w = region.width / 2;
            let half_h = region.height / 2;
            let cx = region.x + half_w;
            let cy = region.y + half_h;
            let children = [
                self.build_node(Rect::new(region.x, region.y, half_w, half_h), depth - 1),
                self.build_node(Rect::new(cx, region.y, half_w, half_h), depth - 1),
                self.build_node(Rect::new(region.x, cy, half_w, half_h), depth - 1),
                self.build_node(Rect::new(cx, cy, half_w, half_h), depth - 1),
            ];
            self.nodes[index].children = Some(children);
        }
        index
    }

    pub fn region(&self) -> Rect {
        self.nodes[0].region
    }

    pub fn depth(&self) -> u32 {
        self.nodes[0].depth + 1
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.placements.contains_key(&id)
    }

    /// Panics if `id` is already indexed.
    pub fn insert(&mut self, id: EntityId, rect: Rect, subscription: SubscriptionId) {
        assert!(
            !self.placements.contains_key(&id),
            "entity {id:?} is already indexed by this quad-tree"
        );
        let nodes = self.placement_nodes(rect);
        for &node in &nodes {
            self.nodes[node].entries.push(id);
        }
        self.placements.insert(
            id,
            Placement {
                nodes,
                subscription,
            },
        );
    }

    /// Removes `id` from every node holding it and hands back its move subscription.
    ///
    /// Panics if `id` is not indexed.
    pub fn remove(&mut self, id: EntityId) -> SubscriptionId {
        let Some(placement) = self.placements.remove(&id) else {
            panic!("entity {id:?} is not indexed by this quad-tree");
        };
        for node in placement.nodes {
            self.nodes[node].entries.retain(|entry| *entry != id);
        }
        placement.subscription
    }

    /// Re-places `id` after a move. Returns whether the node set changed.
    pub fn update(&mut self, id: EntityId, rect: Rect) -> bool {
        let Some(placement) = self.placements.get(&id) else {
            return false;
        };
        let target = self.placement_nodes(rect);
        let current = placement.nodes.iter().copied().collect::<HashSet<_>>();
        if current == target.iter().copied().collect::<HashSet<_>>() {
            return false;
        }
        let subscription = self.remove(id);
        self.insert(id, rect, subscription);
        true
    }

    /// Region rects of the nodes holding `id`, in placement order.
    pub fn holders(&self, id: EntityId) -> Vec<Rect> {
        self.placements
            .get(&id)
            .map(|placement| {
                placement
                    .nodes
                    .iter()
                    .map(|node| self.nodes[*node].region)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lazily yields every indexed entity stored in a node whose quadrant path overlaps
    /// `area`, or every entity when `area` is `None`. Each entity is yielded once.
    pub fn query(&self, area: Option<Rect>) -> Query<'_> {
        Query {
            tree: self,
            area,
            pending: vec![0],
            current: None,
            seen: HashSet::new(),
        }
    }

    fn placement_nodes(&self, rect: Rect) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        self.collect_placement(0, rect, &mut out);
        out
    }

    fn collect_placement(&self, node: NodeIndex, rect: Rect, out: &mut Vec<NodeIndex>) {
        let quad = &self.nodes[node];
        let Some(children) = quad.children else {
            out.push(node);
            return;
        };
        let hits = overlapped_quadrants(quad.region, rect);
        if hits.len() == 4 {
            out.push(node);
            return;
        }
        for quadrant in hits {
            self.collect_placement(children[quadrant], rect, out);
        }
    }
}

/// Quadrants of `region` touched by `rect`, inclusive of the centre lines.
fn overlapped_quadrants(region: Rect, rect: Rect) -> Vec<usize> {
    let cx = region.center_x();
    let cy = region.center_y();
    let mut hits = Vec::with_capacity(4);
    if rect.left() <= cx && rect.top() <= cy {
        hits.push(NW);
    }
    if rect.right() >= cx && rect.top() <= cy {
        hits.push(NE);
    }
    if rect.left() <= cx && rect.bottom() >= cy {
        hits.push(SW);
    }
    if rect.right() >= cx && rect.bottom() >= cy {
        hits.push(SE);
    }
    hits
}

/// Iterator returned by [`QuadTree::query`].
pub struct Query<'a> {
    tree: &'a QuadTree,
    area: Option<Rect>,
    pending: Vec<NodeIndex>,
    current: Option<(NodeIndex, usize)>,
    seen: HashSet<EntityId>,
}

impl Iterator for Query<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        let tree = self.tree;
        loop {
            if let Some((node, position)) = self.current {
                let quad = &tree.nodes[node];
                if let Some(&id) = quad.entries.get(position) {
                    self.current = Some((node, position + 1));
                    if self.seen.insert(id) {
                        return Some(id);
                    }
                    continue;
                }
                self.current = None;
                if let Some(children) = quad.children {
                    let selected = match self.area {
                        Some(area) => overlapped_quadrants(quad.region, area),
                        None => vec![NW, NE, SW, SE],
                    };
                    for quadrant in selected.into_iter().rev() {
                        self.pending.push(children[quadrant]);
                    }
                }
            }
            let node = self.pending.pop()?;
            self.current = Some((node, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::signal::SubscriptionIdAllocator;

    use super::*;

    fn token(allocator: &mut SubscriptionIdAllocator) -> SubscriptionId {
        allocator.allocate()
    }

    #[test]
    fn small_rect_lands_in_single_leaf() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 2);
        tree.insert(EntityId(1), Rect::new(0, 0, 50, 50), token(&mut tokens));

        assert_eq!(tree.holders(EntityId(1)), vec![Rect::new(0, 0, 200, 200)]);
    }

    #[test]
    fn centre_straddling_rect_stays_at_root() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 2);
        tree.insert(EntityId(1), Rect::new(190, 190, 20, 20), token(&mut tokens));

        assert_eq!(tree.holders(EntityId(1)), vec![Rect::new(0, 0, 400, 400)]);
    }

    #[test]
    fn rect_across_one_centre_line_is_held_by_two_quadrants() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 2);
        tree.insert(EntityId(1), Rect::new(180, 20, 40, 20), token(&mut tokens));

        assert_eq!(
            tree.holders(EntityId(1)),
            vec![Rect::new(0, 0, 200, 200), Rect::new(200, 0, 200, 200)]
        );
    }

    #[test]
    fn deeper_tree_keeps_entities_in_deepest_sufficient_node() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 3);
        tree.insert(EntityId(1), Rect::new(10, 10, 20, 20), token(&mut tokens));
        tree.insert(EntityId(2), Rect::new(90, 90, 20, 20), token(&mut tokens));

        assert_eq!(tree.holders(EntityId(1)), vec![Rect::new(0, 0, 100, 100)]);
        assert_eq!(tree.holders(EntityId(2)), vec![Rect::new(0, 0, 200, 200)]);
    }

    #[test]
    fn query_returns_every_overlapping_entity_once() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 3);
        let rects = [
            Rect::new(0, 0, 50, 50),
            Rect::new(180, 20, 40, 20),
            Rect::new(190, 190, 20, 20),
            Rect::new(300, 300, 40, 40),
            Rect::new(350, 10, 30, 380),
        ];
        for (index, rect) in rects.iter().enumerate() {
            tree.insert(EntityId(index as u64), *rect, token(&mut tokens));
        }

        let probes = [
            Rect::new(0, 0, 400, 400),
            Rect::new(170, 0, 60, 60),
            Rect::new(320, 320, 10, 10),
            Rect::new(360, 200, 5, 5),
        ];
        for probe in probes {
            let found = tree.query(Some(probe)).collect::<Vec<_>>();
            let unique = found.iter().copied().collect::<HashSet<_>>();
            assert_eq!(found.len(), unique.len(), "duplicates for {probe:?}");
            for (index, rect) in rects.iter().enumerate() {
                if rect.intersects(&probe) {
                    assert!(
                        unique.contains(&EntityId(index as u64)),
                        "{rect:?} missing from query {probe:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn unbounded_query_lists_everything_in_preorder() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 2);
        tree.insert(EntityId(7), Rect::new(300, 300, 10, 10), token(&mut tokens));
        tree.insert(EntityId(3), Rect::new(10, 10, 10, 10), token(&mut tokens));
        tree.insert(EntityId(5), Rect::new(190, 190, 20, 20), token(&mut tokens));

        let all = tree.query(None).collect::<Vec<_>>();
        assert_eq!(all, vec![EntityId(5), EntityId(3), EntityId(7)]);
    }

    #[test]
    fn update_moves_entity_to_new_leaf_set() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::with_depth(Rect::new(0, 0, 400, 400), 2);
        let subscription = token(&mut tokens);
        tree.insert(EntityId(1), Rect::new(0, 0, 50, 50), subscription);

        assert!(!tree.update(EntityId(1), Rect::new(10, 10, 50, 50)));
        assert!(tree.update(EntityId(1), Rect::new(250, 250, 50, 50)));
        assert_eq!(tree.holders(EntityId(1)), vec![Rect::new(200, 200, 200, 200)]);
        assert!(tree.query(Some(Rect::new(0, 0, 100, 100))).next().is_none());
        assert_eq!(tree.remove(EntityId(1)), subscription);
        assert!(tree.is_empty());
    }

    #[test]
    #[should_panic(expected = "already indexed")]
    fn double_insert_panics() {
        let mut tokens = SubscriptionIdAllocator::default();
        let mut tree = QuadTree::new(Rect::new(0, 0, 100, 100));
        tree.insert(EntityId(1), Rect::new(0, 0, 5, 5), token(&mut tokens));
        tree.insert(EntityId(1), Rect::new(0, 0, 5, 5), token(&mut tokens));
    }

    #[test]
    #[should_panic(expected = "not indexed")]
    fn removing_unknown_entity_panics() {
        let mut tree = QuadTree::new(Rect::new(0, 0, 100, 100));
        tree.remove(EntityId(9));
    }
}
