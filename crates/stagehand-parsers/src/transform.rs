//! Coordinate-system and transform helpers shared by the MOT and stage codecs
//!
//! The engine is Y-up; the scene side is Z-up. Geometry is converted with a
//! fixed basis swap, whole objects with a single 90 degree wrapper about X.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Animation sample rate in frames per second
pub const FRAME_RATE: f32 = 60.0;

/// Radians per unit of the packed LY2 rotation byte
pub const LY2_ROTATION_SCALE: f32 = PI / 128.0;

/// Rotation applied once per animated object to adjust for the Y-up source
pub const AXIS_WRAPPER_ANGLE: f32 = FRAC_PI_2;

/// Swap a position from source order (X, Y, Z) to target order (X, Z, Y)
///
/// The swap is its own inverse, so the same function prepares positions for encoding.
pub fn remap_position(position: [f32; 3]) -> [f32; 3] {
    [position[0], position[2], position[1]]
}

/// The per-object axis wrapper as a matrix
pub fn axis_remap_matrix() -> Mat4 {
    Mat4::from_rotation_x(AXIS_WRAPPER_ANGLE)
}

/// Apply the axis wrapper to a point
pub fn apply_axis_remap(point: [f32; 3]) -> [f32; 3] {
    axis_remap_matrix().transform_point3(Vec3::from(point)).to_array()
}

/// Decode the packed LY2 yaw byte into radians
pub fn decode_ly2_rotation(raw: u8) -> f32 {
    f32::from(raw) * LY2_ROTATION_SCALE
}

/// Convert a time in seconds to the nearest frame number
pub fn seconds_to_frame(seconds: f32) -> i32 {
    (seconds * FRAME_RATE).round() as i32
}

/// Position, XYZ Euler rotation (radians) and scale of a placed object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: [0.0; 3],
        scale: [1.0; 3],
    };

    pub fn new(position: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Build from the nine packed floats used by SCR and LY2 (position, rotation, scale)
    pub fn from_packed(values: [f32; 9]) -> Self {
        Self {
            position: [values[0], values[1], values[2]],
            rotation: [values[3], values[4], values[5]],
            scale: [values[6], values[7], values[8]],
        }
    }

    pub fn to_packed(&self) -> [f32; 9] {
        let mut out = [0.0; 9];
        out[0..3].copy_from_slice(&self.position);
        out[3..6].copy_from_slice(&self.rotation);
        out[6..9].copy_from_slice(&self.scale);
        out
    }

    /// Rotation as a quaternion; X is applied first, then Y, then Z
    pub fn rotation_quat(&self) -> Quat {
        let [x, y, z] = self.rotation;
        Quat::from_euler(EulerRot::ZYX, z, y, x)
    }

    /// Compose scale, then rotation, then translation
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            self.rotation_quat(),
            Vec3::from(self.position),
        )
    }

    /// Matrix of `parent * self`
    pub fn compose(&self, parent: &Transform) -> Mat4 {
        parent.to_matrix() * self.to_matrix()
    }
}
