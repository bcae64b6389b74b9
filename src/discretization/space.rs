use std::fmt;
use std::ops::{Add, Div, Index, Mul, Sub};

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
/// 2D vector in Parametric Space
///
/// Used for query points, element-local (s,t) coordinates and Newton steps
pub struct V2D {
    inner: [f64; 2],
}

impl V2D {
    pub const fn from([s, t]: [f64; 2]) -> Self {
        Self { inner: [s, t] }
    }

    pub fn dot_with(&self, other: &Self) -> f64 {
        self[0] * other[0] + self[1] * other[1]
    }

    pub fn norm(&self) -> f64 {
        self.dot_with(self).sqrt()
    }
}

impl Index<usize> for V2D {
    type Output = f64;
    fn index(&self, index: usize) -> &Self::Output {
        &self.inner[index]
    }
}

impl Add for V2D {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            inner: [self[0] + other[0], self[1] + other[1]],
        }
    }
}

impl Sub for V2D {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            inner: [self[0] - other[0], self[1] - other[1]],
        }
    }
}

impl Mul<f64> for V2D {
    type Output = Self;
    fn mul(self, coefficient: f64) -> Self {
        Self {
            inner: [self[0] * coefficient, self[1] * coefficient],
        }
    }
}

impl Div<f64> for V2D {
    type Output = Self;
    fn div(self, divisor: f64) -> Self {
        Self {
            inner: [self[0] / divisor, self[1] / divisor],
        }
    }
}

impl fmt::Display for V2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(s: {:.10}, t: {:.10})", self[0], self[1])
    }
}

#[cfg(feature = "json_export")]
impl From<V2D> for JsonValue {
    fn from(v: V2D) -> JsonValue {
        json::array![v[0], v[1]]
    }
}

/*
    | [s1, t1] |
    | [s2, t2] |
*/

#[derive(Clone, Copy, Debug)]
/// 2 by 2 Matrix. Used to represent transformations in/into Parametric Space
pub struct M2D {
    pub u: V2D,
    pub v: V2D,
}

impl M2D {
    pub const fn from(r0: [f64; 2], r1: [f64; 2]) -> Self {
        Self {
            u: V2D::from(r0),
            v: V2D::from(r1),
        }
    }

    #[inline]
    pub fn det(&self) -> f64 {
        self.u[0] * self.v[1] - self.u[1] * self.v[0]
    }

    pub fn inverse(&self) -> Self {
        Self {
            u: V2D::from([self.v[1], -1.0 * self.u[1]]),
            v: V2D::from([-1.0 * self.v[0], self.u[0]]),
        } / self.det()
    }
}

impl Div<f64> for M2D {
    type Output = Self;
    fn div(self, divisor: f64) -> Self {
        Self {
            u: self.u / divisor,
            v: self.v / divisor,
        }
    }
}

impl Mul<V2D> for M2D {
    type Output = V2D;
    fn mul(self, v: V2D) -> V2D {
        V2D::from([self.u.dot_with(&v), self.v.dot_with(&v)])
    }
}

impl fmt::Display for M2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "u: [{:.5}, {:.5}]  v: [{:.5}, {:.5}]",
            self.u[0], self.u[1], self.v[0], self.v[1]
        )
    }
}

#[derive(Clone, Copy, Debug, Default)]
/// Point in 3D Real Space
///
/// Physical vertex locations live here. Element areas are the only place
/// real-space geometry enters the transfer computations.
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl Sub for Point {
    type Output = V3D;
    fn sub(self, other: Self) -> V3D {
        V3D::from([self.x - other.x, self.y - other.y, self.z - other.z])
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(x: {:.10}, y: {:.10}, z: {:.10})",
            self.x, self.y, self.z
        )
    }
}

#[cfg(feature = "json_export")]
impl From<Point> for JsonValue {
    fn from(p: Point) -> JsonValue {
        object! {
            "x": p.x,
            "y": p.y,
            "z": p.z,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
/// 3D vector in Real Space. Used for element edge vectors and area normals
pub struct V3D {
    inner: [f64; 3],
}

impl V3D {
    pub const fn from([x, y, z]: [f64; 3]) -> Self {
        Self { inner: [x, y, z] }
    }

    pub fn cross_with(&self, other: &Self) -> Self {
        Self {
            inner: [
                self[1] * other[2] - self[2] * other[1],
                self[2] * other[0] - self[0] * other[2],
                self[0] * other[1] - self[1] * other[0],
            ],
        }
    }

    pub fn dot_with(&self, other: &Self) -> f64 {
        self[0] * other[0] + self[1] * other[1] + self[2] * other[2]
    }

    pub fn norm(&self) -> f64 {
        self.dot_with(self).sqrt()
    }
}

impl Index<usize> for V3D {
    type Output = f64;
    fn index(&self, index: usize) -> &Self::Output {
        &self.inner[index]
    }
}
