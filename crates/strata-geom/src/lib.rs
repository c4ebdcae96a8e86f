#![warn(missing_docs)]

//! Fixed-point geometry types for the strata toolpath core.
//!
//! All coordinates are signed 64-bit integer micrometers. Keeping the
//! geometry in integers makes point comparisons exact and makes the
//! emitted coordinates reproducible across platforms; conversion to
//! millimeters happens only at the formatting boundary.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Neg, Sub};

/// Micrometers per millimeter.
pub const MICRONS_PER_MM: i64 = 1000;

/// A planar point in integer micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate in micrometers.
    pub x: i64,
    /// Y coordinate in micrometers.
    pub y: i64,
}

impl Point {
    /// Create a point from micrometer coordinates.
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Squared length as `f64`, in square micrometers.
    pub fn vsize2_f(&self) -> f64 {
        let x = self.x as f64;
        let y = self.y as f64;
        x * x + y * y
    }

    /// Squared length in square micrometers.
    pub fn vsize2(&self) -> i64 {
        self.x * self.x + self.y * self.y
    }

    /// Length in micrometers, rounded toward zero.
    pub fn vsize(&self) -> i64 {
        self.vsize2_f().sqrt() as i64
    }

    /// Length in millimeters.
    pub fn vsize_mm(&self) -> f64 {
        self.vsize2_f().sqrt() / MICRONS_PER_MM as f64
    }

    /// Is this vector strictly shorter than `len` micrometers?
    ///
    /// Cheap per-axis rejection before the squared comparison, so the
    /// common far-apart case never multiplies.
    pub fn shorter_than(&self, len: i64) -> bool {
        if self.x > len || self.x < -len {
            return false;
        }
        if self.y > len || self.y < -len {
            return false;
        }
        self.vsize2() <= len * len
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Div<i64> for Point {
    type Output = Point;
    fn div(self, rhs: i64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// A point in 3D space, integer micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point3 {
    /// X coordinate in micrometers.
    pub x: i64,
    /// Y coordinate in micrometers.
    pub y: i64,
    /// Z coordinate in micrometers.
    pub z: i64,
}

impl Point3 {
    /// Create a point from micrometer coordinates.
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Planar projection, dropping Z.
    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A closed 2D polygon. Vertices are stored in order; the edge from the
/// last vertex back to the first is implicit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Polygon {
    /// Vertices of the polygon in order, micrometers.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Create a polygon from points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Check if the polygon has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Perimeter length in micrometers, including the closing edge.
    pub fn perimeter_um(&self) -> i64 {
        let n = self.points.len();
        if n < 2 {
            return 0;
        }
        let mut length = 0;
        for i in 0..n {
            let j = (i + 1) % n;
            length += (self.points[j] - self.points[i]).vsize();
        }
        length
    }

    /// Perimeter length in millimeters.
    pub fn perimeter_mm(&self) -> f64 {
        self.perimeter_um() as f64 / MICRONS_PER_MM as f64
    }
}
