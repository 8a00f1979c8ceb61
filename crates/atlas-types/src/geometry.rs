//! Geometric value types: rigid-body poses, pose uncertainty and shape
//! payloads.
//!
//! The world-model core treats these as opaque values – it stores and
//! returns them and only ever calls [`Pose::identity`] and [`Pose::compose`]
//! when chaining relative transforms.
//!
//! # Example
//!
//! ```rust
//! use atlas_types::geometry::{Pose, Quat, Vec3};
//!
//! // robot_base is 1 m forward of the world origin, same orientation.
//! let base = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::identity());
//! // camera is 0.5 m forward of robot_base.
//! let camera = Pose::new(Vec3::new(0.5, 0.0, 0.0), Quat::identity());
//!
//! let world_to_camera = base.compose(camera);
//! assert!((world_to_camera.translation.x - 1.5).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};

use crate::TimeStamp;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quat
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quat {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        // Express v as a pure quaternion.
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: the pose of a child frame relative to its
/// parent frame.
///
/// To convert a point expressed in the child frame into the parent frame,
/// rotate it by `rotation` then add `translation`.  [`Pose::to_matrix`]
/// yields the equivalent homogeneous 4x4 matrix (row-major).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Pose {
    /// Create a pose from a translation and rotation.
    pub const fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// A pure translation, no rotation.
    pub const fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// The identity transform (no translation, no rotation).
    pub const fn identity() -> Self {
        Self::new(Vec3::zero(), Quat::identity())
    }

    /// Compose two transforms: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        // Rotate other's translation by self's rotation, then add.
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// The homogeneous 4x4 matrix view of this pose, row-major.
    pub fn to_matrix(self) -> [[f32; 4]; 4] {
        let Quat { w, x, y, z } = self.rotation;
        let t = self.translation;
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
                t.x,
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
                t.y,
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
                t.z,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PoseCovariance
// ────────────────────────────────────────────────────────────────────────────

/// Opaque uncertainty descriptor attached to a pose sample: a 6x6 covariance
/// over (x, y, z, roll, pitch, yaw), stored row-major.
///
/// The world model never inspects the contents; estimators produce it and
/// consumers interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseCovariance {
    #[serde(with = "serde_cov")]
    pub matrix: [f32; 36],
}

impl PoseCovariance {
    /// The all-zero covariance (a pose treated as exact).
    pub const fn zero() -> Self {
        Self { matrix: [0.0; 36] }
    }

    /// A diagonal covariance from per-axis variances
    /// (x, y, z, roll, pitch, yaw).
    pub fn from_diagonal(variances: [f32; 6]) -> Self {
        let mut matrix = [0.0; 36];
        for (i, v) in variances.into_iter().enumerate() {
            matrix[i * 6 + i] = v;
        }
        Self { matrix }
    }
}

// serde does not derive for arrays beyond 32 elements; go through a Vec.
mod serde_cov {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(matrix: &[f32; 36], ser: S) -> Result<S::Ok, S::Error> {
        matrix.as_slice().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[f32; 36], D::Error> {
        let values = Vec::<f32>::deserialize(de)?;
        values
            .try_into()
            .map_err(|v: Vec<f32>| serde::de::Error::invalid_length(v.len(), &"36 floats"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shape
// ────────────────────────────────────────────────────────────────────────────

/// A point in 3-D space, used by point-cloud payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    /// Create a new point.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Opaque geometric payload carried by a geometry node.
///
/// The world model stores and returns shapes without interpreting them;
/// dimensions are in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "dimensions")]
pub enum Shape {
    Sphere { radius: f32 },
    Cuboid { x: f32, y: f32, z: f32 },
    Cylinder { radius: f32, height: f32 },
    PointCloud { points: Vec<Point3> },
}

/// A transform sample: a pose valid from a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub stamp: TimeStamp,
    pub pose: Pose,
}

/// A transform sample with attached uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertainPoseSample {
    pub stamp: TimeStamp,
    pub pose: Pose,
    pub covariance: PoseCovariance,
}
