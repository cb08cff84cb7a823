//! 3-D coordinates for the load-balancing space.
//!
//! Positions have no physical meaning; they give the migration policy a
//! continuous space in which "nearby" schedulers can exchange actors and a
//! load imbalance produces a directional signal.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Sub};
use serde::{Deserialize, Serialize};

/// A point (or displacement) in the abstract 3-D space.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pos {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Pos {
    /// The origin, also the null position.
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Creates a position from its components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(self) -> f32 {
        self.z
            .mul_add(self.z, self.y.mul_add(self.y, self.x * self.x))
            .sqrt()
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn dist(self, other: Self) -> f32 {
        (self - other).norm()
    }
}

impl Add for Pos {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Pos {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Pos {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Pos {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Pos {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_default() {
        assert_eq!(Pos::default(), Pos::ORIGIN);
        assert_eq!(Pos::ORIGIN.norm(), 0.0);
    }

    #[test]
    fn arithmetic() {
        let a = Pos::new(1.0, 2.0, 3.0);
        let b = Pos::new(-1.0, 0.5, 1.0);
        assert_eq!(a + b, Pos::new(0.0, 2.5, 4.0));
        assert_eq!(a - b, Pos::new(2.0, 1.5, 2.0));
        assert_eq!(a * 2.0, Pos::new(2.0, 4.0, 6.0));
        assert_eq!(a / 2.0, Pos::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn norm_and_dist() {
        let p = Pos::new(3.0, 4.0, 0.0);
        assert!((p.norm() - 5.0).abs() < f32::EPSILON);
        assert!((p.dist(Pos::ORIGIN) - 5.0).abs() < f32::EPSILON);
        assert!((Pos::new(1.0, 0.0, 0.0).dist(Pos::new(4.0, 4.0, 0.0)) - 5.0).abs() < 1e-6);
    }
}
