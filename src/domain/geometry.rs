/// Plane geometry for the single-screen world.
///
/// World units are pixels of the original 2D canvas; the terminal renderer
/// scales them down. Every position is the top-left corner of an
/// axis-aligned box.

use std::f32::consts::PI;

use super::entity::Direction;

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Unit vector for an angle in radians (0 = +x, screen y grows downward).
    pub fn from_angle(angle: f32) -> Self {
        Vec2 { x: angle.cos(), y: angle.sin() }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    pub fn scale(self, k: f32) -> Self {
        Vec2 { x: self.x * k, y: self.y * k }
    }

    /// Clamp each component into [-1, 1]. Input devices may over-report.
    pub fn clamp_unit(self) -> Self {
        Vec2 { x: self.x.clamp(-1.0, 1.0), y: self.y.clamp(-1.0, 1.0) }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub const fn new(w: f32, h: f32) -> Self {
        Size { w, h }
    }
}

/// Axis-aligned rectangle: `pos` is the top-left corner.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Rect {
    pub pos: Vec2,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect { pos: Vec2 { x, y }, size: Size { w, h } }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.pos.x + self.size.w / 2.0, self.pos.y + self.size.h / 2.0)
    }

    /// Strict AABB overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.pos.x < other.pos.x + other.size.w
            && self.pos.x + self.size.w > other.pos.x
            && self.pos.y < other.pos.y + other.size.h
            && self.pos.y + self.size.h > other.pos.y
    }
}

/// The playable world: positions live in `[0, width - w] × [0, height - h]`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(width: f32, height: f32) -> Self {
        Bounds { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Clamp a top-left position so a box of `size` stays inside, keeping
    /// `margin` units away from every edge.
    pub fn clamp(&self, pos: Vec2, size: Size, margin: f32) -> Vec2 {
        let max_x = (self.width - size.w - margin).max(margin);
        let max_y = (self.height - size.h - margin).max(margin);
        Vec2 {
            x: pos.x.clamp(margin, max_x),
            y: pos.y.clamp(margin, max_y),
        }
    }

    /// Clamp a move from `from` to `to`. The box always stays inside the
    /// world, and never goes deeper into the `margin` band than it already
    /// was. A box already inside the band is not pushed out of it; it
    /// leaves at its own speed.
    pub fn clamp_move(&self, from: Vec2, to: Vec2, size: Size, margin: f32) -> Vec2 {
        let axis = |from: f32, to: f32, extent: f32, span: f32| {
            let hard_max = (span - extent).max(0.0);
            let soft_min = margin.min(hard_max);
            let soft_max = (hard_max - margin).max(soft_min);
            let lo = soft_min.min(from).max(0.0);
            let hi = soft_max.max(from).min(hard_max);
            to.clamp(lo, hi.max(lo))
        };
        Vec2 {
            x: axis(from.x, to.x, size.w, self.width),
            y: axis(from.y, to.y, size.h, self.height),
        }
    }

    /// Is a box of `size` at `pos` within `buffer` of two perpendicular edges?
    pub fn in_corner(&self, pos: Vec2, size: Size, buffer: f32) -> bool {
        let near_x = pos.x <= buffer || pos.x + size.w >= self.width - buffer;
        let near_y = pos.y <= buffer || pos.y + size.h >= self.height - buffer;
        near_x && near_y
    }
}

/// Snap a free angle to the cardinal direction it is closest to
/// (used for sprite facing).
pub fn direction_of(v: Vec2) -> Option<Direction> {
    if v.is_zero() {
        return None;
    }
    if v.x.abs() >= v.y.abs() {
        Some(if v.x < 0.0 { Direction::Left } else { Direction::Right })
    } else {
        Some(if v.y < 0.0 { Direction::Up } else { Direction::Down })
    }
}

/// Upper bound on any angular perturbation applied to movement.
pub const MAX_PERTURBATION: f32 = PI / 4.0;

/// Clamp an angular offset into `[-MAX_PERTURBATION, MAX_PERTURBATION]`.
pub fn bound_perturbation(offset: f32) -> f32 {
    offset.clamp(-MAX_PERTURBATION, MAX_PERTURBATION)
}
