use image::RgbaImage;

use crate::geometry::Rect;

/// Alpha threshold above which a pixel counts as solid.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 127;

/// One bit per pixel, row-major, anchored at the owning rect's top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    width: u32,
    height: u32,
    bits: Vec<u64>,
}

impl PixelMask {
    pub fn empty(width: u32, height: u32) -> Self {
        let words = (width as usize * height as usize).div_ceil(64);
        Self {
            width,
            height,
            bits: vec![0; words],
        }
    }

    pub fn solid(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| true)
    }

    pub fn from_fn(width: u32, height: u32, mut solid: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::empty(width, height);
        for y in 0..height {
            for x in 0..width {
                if solid(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    pub fn from_alpha(image: &RgbaImage, threshold: u8) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y).0[3] > threshold
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Out-of-bounds coordinates read as clear.
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return false;
        }
        let bit = y as usize * self.width as usize + x as usize;
        self.bits[bit / 64] & (1 << (bit % 64)) != 0
    }

    pub fn set(&mut self, x: u32, y: u32, solid: bool) {
        assert!(
            x < self.width && y < self.height,
            "mask pixel ({x}, {y}) outside {}x{}",
            self.width,
            self.height
        );
        let bit = y as usize * self.width as usize + x as usize;
        if solid {
            self.bits[bit / 64] |= 1 << (bit % 64);
        } else {
            self.bits[bit / 64] &= !(1 << (bit % 64));
        }
    }

    pub fn count(&self) -> u32 {
        self.bits.iter().map(|word| word.count_ones()).sum()
    }
}

/// Bounding box, in world coordinates, of the pixels solid in both masks.
///
/// Each mask is positioned at the top-left corner of its rect, so the relative offset
/// is `rect_b.top_left() - rect_a.top_left()`. Returns `None` when the masks do not
/// overlap.
pub fn overlap_mask(
    rect_a: Rect,
    mask_a: &PixelMask,
    rect_b: Rect,
    mask_b: &PixelMask,
) -> Option<Rect> {
    overlap_region(rect_a, Some(mask_a), rect_b, Some(mask_b))
}

/// As [`overlap_mask`], with `None` standing for a fully opaque rect.
pub(crate) fn overlap_region(
    rect_a: Rect,
    mask_a: Option<&PixelMask>,
    rect_b: Rect,
    mask_b: Option<&PixelMask>,
) -> Option<Rect> {
    let region = rect_a.intersection(&rect_b)?;
    if mask_a.is_none() && mask_b.is_none() {
        return Some(region);
    }

    let solid_at = |rect: Rect, mask: Option<&PixelMask>, x: i32, y: i32| match mask {
        Some(mask) => mask.get(x - rect.x, y - rect.y),
        None => true,
    };

    let mut bounds: Option<(i32, i32, i32, i32)> = None;
    for y in region.top()..region.bottom() {
        for x in region.left()..region.right() {
            if solid_at(rect_a, mask_a, x, y) && solid_at(rect_b, mask_b, x, y) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((min_x, min_y, max_x, max_y)) => {
                        (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                    }
                });
            }
        }
    }

    bounds.map(|(min_x, min_y, max_x, max_y)| {
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    })
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn diagonal(size: u32) -> PixelMask {
        PixelMask::from_fn(size, size, |x, y| x == y)
    }

    #[test]
    fn alpha_threshold_selects_solid_pixels() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([255, 0, 0, 10]));

        let mask = PixelMask::from_alpha(&image, DEFAULT_ALPHA_THRESHOLD);

        assert!(mask.get(0, 0));
        assert!(!mask.get(1, 0));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn out_of_bounds_reads_clear() {
        let mask = PixelMask::solid(4, 4);
        assert!(mask.get(3, 3));
        assert!(!mask.get(4, 0));
        assert!(!mask.get(-1, 2));
    }

    #[test]
    fn overlapping_rects_with_disjoint_pixels_miss() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 0, 10, 10);
        let left_column = PixelMask::from_fn(10, 10, |x, _| x == 0);
        let solid = PixelMask::solid(10, 10);

        assert_eq!(overlap_mask(a, &left_column, b, &solid), None);
    }

    #[test]
    fn overlap_reports_world_space_bounding_box() {
        let a = Rect::new(100, 100, 8, 8);
        let b = Rect::new(104, 102, 8, 8);

        let hit = overlap_mask(a, &diagonal(8), b, &PixelMask::solid(8, 8));

        assert_eq!(hit, Some(Rect::new(104, 104, 4, 4)));
    }

    #[test]
    fn missing_mask_acts_as_opaque_rect() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(2, 2, 4, 4);

        assert_eq!(overlap_region(a, None, b, None), Some(Rect::new(2, 2, 2, 2)));
        let corner = PixelMask::from_fn(4, 4, |x, y| x == 3 && y == 3);
        assert_eq!(
            overlap_region(a, Some(&corner), b, None),
            Some(Rect::new(3, 3, 1, 1))
        );
    }
}
