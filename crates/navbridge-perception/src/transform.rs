//! Rigid-body math for the navigation frame.
//!
//! Small, dependency-free types for 3-D vectors, rotation matrices, Euler
//! angles and rigid transforms.  Everything is `f64` and `Copy`.
//!
//! Euler angles follow the aerospace Z-Y-X convention:
//! `R = Rz(yaw) · Ry(pitch) · Rx(roll)`.
//!
//! # Example
//!
//! ```rust
//! use navbridge_perception::transform::{Rotation3, Transform3D, Vec3};
//!
//! // 90° yaw about down, then 1 m north.
//! let t = Transform3D::new(Rotation3::about_z(std::f64::consts::FRAC_PI_2), Vec3::new(1.0, 0.0, 0.0));
//!
//! // A point 1 m north in the source frame lands 1 m north, 1 m east.
//! let p = t.apply_point(Vec3::new(1.0, 0.0, 0.0));
//! assert!((p.x - 1.0).abs() < 1e-9);
//! assert!((p.y - 1.0).abs() < 1e-9);
//! ```

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// `true` if any component is NaN.
    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }

    /// `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EulerAngles
// ────────────────────────────────────────────────────────────────────────────

/// Roll, pitch and yaw in radians (Z-Y-X convention).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// `true` if any angle is NaN.
    pub fn has_nan(&self) -> bool {
        self.roll.is_nan() || self.pitch.is_nan() || self.yaw.is_nan()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rotation3
// ────────────────────────────────────────────────────────────────────────────

/// A 3×3 rotation matrix, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation3 {
    m: [[f64; 3]; 3],
}

impl Rotation3 {
    /// Build from rows.  The caller is responsible for providing a proper
    /// rotation (orthonormal, determinant +1).
    pub const fn from_rows(m: [[f64; 3]; 3]) -> Self {
        Self { m }
    }

    /// The identity rotation.
    pub const fn identity() -> Self {
        Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn about_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]])
    }

    pub fn about_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]])
    }

    pub fn about_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// `Rz(yaw) · Ry(pitch) · Rx(roll)`.
    pub fn from_euler(angles: EulerAngles) -> Self {
        Self::about_z(angles.yaw)
            .mul(Self::about_y(angles.pitch))
            .mul(Self::about_x(angles.roll))
    }

    /// Matrix product: `self` applied after `rhs`.
    pub fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Self::from_rows(out)
    }

    /// Transpose (== inverse for a rotation).
    pub fn transpose(self) -> Self {
        let m = self.m;
        Self::from_rows([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    /// Rotate a vector.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let m = self.m;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    /// Re-express a rotation given in another basis: `self · r · selfᵀ`.
    pub fn conjugate(self, r: Self) -> Self {
        self.mul(r).mul(self.transpose())
    }

    /// Decompose into Z-Y-X Euler angles.
    ///
    /// Pitch is clamped to `[-π/2, π/2]`; at gimbal lock roll absorbs the
    /// remaining rotation.  NaN entries propagate.
    pub fn to_euler(self) -> EulerAngles {
        let m = self.m;
        EulerAngles {
            roll: m[2][1].atan2(m[2][2]),
            pitch: (-m[2][0]).clamp(-1.0, 1.0).asin(),
            yaw: m[1][0].atan2(m[0][0]),
        }
    }

    /// Heading component, `(-π, π]`.
    pub fn yaw(self) -> f64 {
        self.m[1][0].atan2(self.m[0][0])
    }

    pub fn rows(&self) -> &[[f64; 3]; 3] {
        &self.m
    }
}

impl Default for Rotation3 {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body transform: rotation followed by translation.
///
/// To map a point from the source frame into the target frame, rotate it by
/// `rotation` then add `translation`.  Free vectors (velocities) are only
/// rotated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform3D {
    pub rotation: Rotation3,
    pub translation: Vec3,
}

impl Transform3D {
    pub fn new(rotation: Rotation3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Rotation3::identity(), Vec3::zero())
    }

    /// Compose two transforms: `other` applied first, then `self`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translation = self.translation.add(self.rotation.rotate(other.translation));
        Self::new(self.rotation.mul(other.rotation), translation)
    }

    /// The inverse transform.
    pub fn inverse(self) -> Self {
        let inv = self.rotation.transpose();
        Self::new(inv, Vec3::zero().sub(inv.rotate(self.translation)))
    }

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }

    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
