//! Axis-aligned physics primitives shared by every minigame.
//!
//! Positions are the top-left corner of a box, y grows downwards, and all
//! speeds are expressed in world units per tick. Collision resolution is
//! done one axis at a time: a body tests the box it would occupy after
//! moving along x alone, then along y alone, and loses its velocity on
//! every axis that would overlap something.

use serde::{Deserialize, Serialize};

/// Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the normalized vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// An axis-aligned collision box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Strict AABB overlap test. Boxes that merely touch do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }

    pub fn contains(&self, point: Vector2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Which axes were blocked during a collision pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisHits {
    pub x: bool,
    pub y: bool,
}

impl AxisHits {
    pub fn any(&self) -> bool {
        self.x || self.y
    }
}

/// A box that moves by its velocity once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub position: Vector2,
    pub velocity: Vector2,
    pub width: f32,
    pub height: f32,
}

impl Body {
    pub fn new(position: Vector2, width: f32, height: f32) -> Self {
        Self {
            position,
            velocity: Vector2::ZERO,
            width,
            height,
        }
    }

    /// The collision box at the current position.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.width, self.height)
    }

    /// Zeroes every velocity component whose move would overlap a collider.
    ///
    /// Both axes are tested from the current position, independently of
    /// each other.
    pub fn resolve_axes(&mut self, colliders: &[Rect]) -> AxisHits {
        let bounds = self.bounds();
        let mut hits = AxisHits::default();

        if self.velocity.x != 0.0 {
            let moved = bounds.translated(self.velocity.x, 0.0);
            if colliders.iter().any(|c| moved.intersects(c)) {
                self.velocity.x = 0.0;
                hits.x = true;
            }
        }

        if self.velocity.y != 0.0 {
            let moved = bounds.translated(0.0, self.velocity.y);
            if colliders.iter().any(|c| moved.intersects(c)) {
                self.velocity.y = 0.0;
                hits.y = true;
            }
        }

        hits
    }

    /// Moves by the current velocity, then drops it so nothing keeps sliding.
    pub fn integrate(&mut self) {
        self.position = self.position.add(&self.velocity);
        self.velocity = Vector2::ZERO;
    }
}

/// Sign of `delta` outside of a symmetric dead zone, zero inside it.
pub fn steer(delta: f32, dead_zone: f32) -> f32 {
    if delta > dead_zone {
        1.0
    } else if delta < -dead_zone {
        -1.0
    } else {
        0.0
    }
}
