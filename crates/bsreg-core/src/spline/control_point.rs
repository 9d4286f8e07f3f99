//! Homogeneous control point type.

use std::ops::{Add, AddAssign, Mul, Sub};

use crate::spatial::Point;

/// A control point with `D` coordinates and a homogeneous weight.
///
/// Arithmetic applies to coordinates and weight alike, so a weighted sum of
/// control points whose basis weights sum to one keeps a unit weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint<const D: usize> {
    pub coords: [f64; D],
    pub weight: f64,
}

impl<const D: usize> ControlPoint<D> {
    /// Control point with unit weight.
    pub fn new(coords: [f64; D]) -> Self {
        Self { coords, weight: 1.0 }
    }

    pub fn with_weight(coords: [f64; D], weight: f64) -> Self {
        Self { coords, weight }
    }

    /// All-zero accumulator, weight included.
    pub fn zero() -> Self {
        Self {
            coords: [0.0; D],
            weight: 0.0,
        }
    }

    pub fn coords(&self) -> &[f64; D] {
        &self.coords
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Coordinates divided by the homogeneous weight, `None` for a zero weight.
    pub fn unweight(&self) -> Option<[f64; D]> {
        if self.weight == 0.0 {
            return None;
        }
        Some(self.coords.map(|c| c / self.weight))
    }

    /// Coordinates as a physical point, ignoring the weight.
    pub fn to_point(&self) -> Point<D> {
        Point::from(self.coords)
    }
}

impl<const D: usize> Default for ControlPoint<D> {
    fn default() -> Self {
        Self::new([0.0; D])
    }
}

impl<const D: usize> From<Point<D>> for ControlPoint<D> {
    fn from(point: Point<D>) -> Self {
        Self::new(std::array::from_fn(|i| point[i]))
    }
}

impl<const D: usize> Add for ControlPoint<D> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            coords: std::array::from_fn(|i| self.coords[i] + rhs.coords[i]),
            weight: self.weight + rhs.weight,
        }
    }
}

impl<const D: usize> AddAssign for ControlPoint<D> {
    fn add_assign(&mut self, rhs: Self) {
        for (c, r) in self.coords.iter_mut().zip(rhs.coords) {
            *c += r;
        }
        self.weight += rhs.weight;
    }
}

impl<const D: usize> Sub for ControlPoint<D> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            coords: std::array::from_fn(|i| self.coords[i] - rhs.coords[i]),
            weight: self.weight - rhs.weight,
        }
    }
}

impl<const D: usize> Mul<f64> for ControlPoint<D> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            coords: self.coords.map(|c| c * rhs),
            weight: self.weight * rhs,
        }
    }
}
