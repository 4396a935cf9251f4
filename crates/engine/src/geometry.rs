use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

impl Vec2i {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// Integer axis-aligned rectangle in world pixels.
///
/// `right()` and `bottom()` are exclusive edges, so two rects that merely touch do not
/// intersect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn left(&self) -> i32 {
        self.x
    }

    pub const fn top(&self) -> i32 {
        self.y
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }

    pub const fn center_y(&self) -> i32 {
        self.y + self.height / 2
    }

    pub const fn top_left(&self) -> Vec2i {
        Vec2i::new(self.x, self.y)
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn set_left(&mut self, left: i32) {
        self.x = left;
    }

    pub fn set_top(&mut self, top: i32) {
        self.y = top;
    }

    pub fn set_right(&mut self, right: i32) {
        self.x = right - self.width;
    }

    pub fn set_bottom(&mut self, bottom: i32) {
        self.y = bottom - self.height;
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }

    pub fn translated(mut self, dx: i32, dy: i32) -> Self {
        self.translate(dx, dy);
        self
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Whether `other` lies entirely inside `self`, edges included.
    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Index of the first rect in `rects` intersecting `self`.
    pub fn first_intersecting(&self, rects: &[Rect]) -> Option<usize> {
        rects.iter().position(|rect| self.intersects(rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        let c = Rect::new(0, 10, 10, 10);

        assert!(!a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&Rect::new(9, 9, 5, 5)));
    }

    #[test]
    fn empty_rect_never_intersects() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(!a.intersects(&Rect::new(2, 2, 0, 4)));
        assert!(!Rect::new(2, 2, 4, 0).intersects(&a));
    }

    #[test]
    fn edge_setters_move_without_resizing() {
        let mut rect = Rect::new(100, 100, 32, 48);
        rect.set_bottom(140);
        assert_eq!(rect, Rect::new(100, 92, 32, 48));
        rect.set_right(50);
        assert_eq!(rect.left(), 18);
        assert_eq!(rect.width, 32);
    }

    #[test]
    fn intersection_and_union_cover_expected_area() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 6, 10, 10);

        assert_eq!(a.intersection(&b), Some(Rect::new(5, 6, 5, 4)));
        assert_eq!(a.union(&b), Rect::new(0, 0, 15, 16));
        assert_eq!(a.intersection(&Rect::new(20, 20, 1, 1)), None);
    }

    #[test]
    fn contains_is_inclusive() {
        let outer = Rect::new(0, 0, 10, 10);
        assert!(outer.contains(&outer));
        assert!(outer.contains(&Rect::new(2, 2, 8, 8)));
        assert!(!outer.contains(&Rect::new(2, 2, 9, 8)));
    }

    #[test]
    fn first_intersecting_reports_lowest_index() {
        let probe = Rect::new(0, 0, 10, 10);
        let rects = [
            Rect::new(50, 50, 5, 5),
            Rect::new(5, 5, 10, 10),
            Rect::new(0, 0, 1, 1),
        ];
        assert_eq!(probe.first_intersecting(&rects), Some(1));
        assert_eq!(probe.first_intersecting(&rects[..1]), None);
    }
}
