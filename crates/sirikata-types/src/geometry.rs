//! Positions, bounds, and the motion-extrapolation types the rest of
//! the core builds on. All geometry is single-precision, right-handed.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Monotonic simulation time, in microseconds since an arbitrary epoch.
/// Never wall-clock: callers that need wall-clock time stamp it
/// themselves and convert.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Time(pub u64);

impl Time {
    pub const ZERO: Time = Time(0);

    pub fn from_seconds(s: f64) -> Self {
        Time((s * 1_000_000.0).round() as u64)
    }

    pub fn seconds_since(self, earlier: Time) -> f64 {
        (self.0.saturating_sub(earlier.0)) as f64 / 1_000_000.0
    }
}

impl Add<f64> for Time {
    type Output = Time;
    fn add(self, secs: f64) -> Time {
        Time(self.0 + (secs * 1_000_000.0).round() as u64)
    }
}

/// Which axis points "up" in imported mesh geometry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UpAxis {
    Y,
    Z,
}

#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn normalized(self) -> Vector3 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vector3::ZERO
        } else {
            self * (1.0 / len)
        }
    }

    pub fn component(self, axis: usize) -> f32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn with_component(mut self, axis: usize, value: f32) -> Vector3 {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
        self
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// An axis-aligned bounding box, min/max corners inclusive.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vector3,
    pub max: Vector3,
}

impl BoundingBox {
    pub fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: Vector3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Clamp a point into this box on every axis. Used by DCSEG's
    /// `lookup` to handle out-of-range query coordinates (§8 boundary
    /// behaviour).
    pub fn clamp(&self, p: Vector3) -> Vector3 {
        Vector3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    pub fn center(&self) -> Vector3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vector3 {
        self.max - self.min
    }

    /// The axis (0=x,1=y,2=z) along which this box is longest —
    /// DCSEG splits a leaf along its long axis.
    pub fn long_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// Split this box in half along `axis`, returning (low, high).
    pub fn split(&self, axis: usize) -> (BoundingBox, BoundingBox) {
        let mid = (self.min.component(axis) + self.max.component(axis)) * 0.5;
        let low = BoundingBox::new(self.min, self.max.with_component(axis, mid));
        let high = BoundingBox::new(self.min.with_component(axis, mid), self.max);
        (low, high)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            Vector3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            Vector3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }
}

/// A bounding sphere, used for per-object query-visibility radius and
/// LOD scaling in the aggregate pipeline.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vector3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vector3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Position sampled at `t0` plus a constant velocity — linear
/// extrapolation only, per §3.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct TimedMotionVector {
    pub t0: Time,
    pub position: Vector3,
    pub velocity: Vector3,
}

impl TimedMotionVector {
    pub fn new(t0: Time, position: Vector3, velocity: Vector3) -> Self {
        Self { t0, position, velocity }
    }

    pub fn position_at(&self, t: Time) -> Vector3 {
        self.position + self.velocity * t.seconds_since(self.t0) as f32
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// A unit quaternion, `(x, y, z, w)`.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

/// Orientation sampled at `t0` plus a constant angular velocity
/// (radians/second about each axis, small-angle integrated).
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct TimedMotionQuaternion {
    pub t0: Time,
    pub orientation: Quaternion,
    pub angular_velocity: Vector3,
}

impl TimedMotionQuaternion {
    pub fn new(t0: Time, orientation: Quaternion, angular_velocity: Vector3) -> Self {
        Self { t0, orientation, angular_velocity }
    }

    /// Extrapolated orientation at `t`, using a small-angle
    /// approximation of integrating constant angular velocity. Good
    /// enough for visibility/LOD purposes; not a physics engine.
    pub fn orientation_at(&self, t: Time) -> Quaternion {
        let dt = t.seconds_since(self.t0) as f32;
        if dt == 0.0 || self.angular_velocity.length_squared() == 0.0 {
            return self.orientation;
        }
        let axis = self.angular_velocity.normalized();
        let angle = self.angular_velocity.length() * dt;
        let (s, c) = (angle / 2.0).sin_cos();
        let delta = Quaternion::new(axis.x * s, axis.y * s, axis.z * s, c);
        quat_mul(delta, self.orientation)
    }
}

fn quat_mul(a: Quaternion, b: Quaternion) -> Quaternion {
    Quaternion::new(
        a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_stays_inside_box() {
        let bbox = BoundingBox::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let clamped = bbox.clamp(Vector3::new(5.0, -5.0, 0.5));
        assert_eq!(clamped, Vector3::new(1.0, -1.0, 0.5));
    }

    #[test]
    fn long_axis_picks_largest_extent() {
        let bbox = BoundingBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(10.0, 2.0, 2.0));
        assert_eq!(bbox.long_axis(), 0);
    }

    #[test]
    fn split_partitions_box() {
        let bbox = BoundingBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(10.0, 10.0, 10.0));
        let (low, high) = bbox.split(0);
        assert_eq!(low.max.x, 5.0);
        assert_eq!(high.min.x, 5.0);
        assert_eq!(low.union(&high), bbox);
    }

    #[test]
    fn linear_extrapolation() {
        let tmv = TimedMotionVector::new(Time(0), Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0));
        let pos = tmv.position_at(Time::from_seconds(2.0));
        assert!((pos.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn bincode_roundtrip_bbox() {
        let bbox = BoundingBox::new(Vector3::new(-1.0, -2.0, -3.0), Vector3::new(1.0, 2.0, 3.0));
        let bytes = bincode::serialize(&bbox).unwrap();
        let back: BoundingBox = bincode::deserialize(&bytes).unwrap();
        assert_eq!(bbox, back);
    }
}
