use petmatch_vision::Region;

/// Default outward padding applied to a resolved subject box, as a
/// fraction of box width/height on each axis.
pub const PAD_FRACTION: f32 = 0.15;

/// Default fraction of subject-box height kept for the face region.
pub const FACE_RATIO: f32 = 0.65;

/// A box smaller than this fraction of the image area is invalid.
pub const MIN_AREA_FRACTION: f64 = 1e-4;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

/// Axis-aligned bounding box `(xmin, ymin, xmax, ymax)` in pixel
/// coordinates. `(0,0,0,0)` is the sentinel for "not provided".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// The whole-image box `(0, 0, W, H)`.
    pub fn full(size: ImageSize) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    /// The all-zero sentinel meaning "no box provided".
    pub fn is_sentinel(&self) -> bool {
        self.xmin == 0 && self.ymin == 0 && self.xmax == 0 && self.ymax == 0
    }

    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> i32 {
        self.ymax - self.ymin
    }

    /// Clamp all coordinates into `[0,W] x [0,H]`.
    pub fn clamp(self, size: ImageSize) -> Self {
        let w = size.width as i32;
        let h = size.height as i32;
        Self {
            xmin: self.xmin.clamp(0, w),
            ymin: self.ymin.clamp(0, h),
            xmax: self.xmax.clamp(0, w),
            ymax: self.ymax.clamp(0, h),
        }
    }

    /// A box is valid when, after clamping to the image, it keeps positive
    /// width and height and covers at least [MIN_AREA_FRACTION] of the
    /// image area.
    pub fn is_valid(&self, size: ImageSize) -> bool {
        let c = self.clamp(size);
        if c.width() <= 0 || c.height() <= 0 {
            return false;
        }
        let area = c.width() as f64 * c.height() as f64;
        size.area() > 0.0 && area >= MIN_AREA_FRACTION * size.area()
    }

    /// Expand the box outward by `frac` of its width/height on each axis,
    /// clamping the result to the image bounds.
    pub fn pad(self, size: ImageSize, frac: f32) -> Self {
        let px = (self.width() as f32 * frac) as i32;
        let py = (self.height() as f32 * frac) as i32;
        Self {
            xmin: self.xmin - px,
            ymin: self.ymin - py,
            xmax: self.xmax + px,
            ymax: self.ymax + py,
        }
        .clamp(size)
    }
}

impl From<Region> for BBox {
    fn from(r: Region) -> Self {
        Self::new(r.xmin, r.ymin, r.xmax, r.ymax)
    }
}

impl From<BBox> for Region {
    fn from(b: BBox) -> Self {
        Self {
            xmin: b.xmin,
            ymin: b.ymin,
            xmax: b.xmax,
            ymax: b.ymax,
        }
    }
}

/// Derive the face-region box from a subject box: same x-extent, top
/// `ratio` of the height. Pure; assumes a valid input box.
pub fn face_box(b: BBox, ratio: f32) -> BBox {
    let h = b.height() as f32;
    BBox {
        xmin: b.xmin,
        ymin: b.ymin,
        xmax: b.xmax,
        ymax: b.ymin + (h * ratio).round() as i32,
    }
}
