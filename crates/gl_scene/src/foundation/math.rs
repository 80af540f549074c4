//! Math utilities and types
//!
//! Provides the fundamental math types used by the scene library. All matrices
//! follow the OpenGL conventions: column-major storage, column vectors,
//! right-handed view space and a `[-1, 1]` clip-space depth range.

pub use nalgebra::{Matrix4, Quaternion, Unit, UnitQuaternion, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Unit quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 4
    pub const QUARTER_PI: f32 = PI * 0.25;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}

/// Extension trait for Mat4 with the constructors the renderer needs
pub trait Mat4Ext {
    /// Rotation matrix around the X axis (radians)
    fn rotation_x(angle: f32) -> Mat4;

    /// Rotation matrix around the Y axis (radians)
    fn rotation_y(angle: f32) -> Mat4;

    /// Rotation matrix around the Z axis (radians)
    fn rotation_z(angle: f32) -> Mat4;

    /// OpenGL perspective projection; `fov_y` in radians, depth mapped to `[-1, 1]`
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Column-major float array, ready for `glUniformMatrix4fv` with `transpose = false`
    fn to_cols_array(&self) -> [f32; 16];
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // nalgebra's constructor already produces the GL [-1, 1] depth mapping
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn to_cols_array(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.as_slice());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_deg_rad_roundtrip() {
        assert_relative_eq!(utils::deg_to_rad(180.0), constants::PI);
        assert_relative_eq!(utils::rad_to_deg(constants::QUARTER_PI), 45.0, epsilon = 1e-4);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let eye = view.transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(eye.coords, Vec3::zeros(), epsilon = 1e-6);

        // The target ends up straight ahead, down -Z
        let target = view.transform_point(&Point3::origin());
        assert_relative_eq!(target.z, -5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_perspective_maps_near_plane_to_minus_one() {
        let proj = Mat4::perspective(constants::QUARTER_PI, 16.0 / 9.0, 0.1, 100.0);
        let clip = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert_relative_eq!(clip.z / clip.w, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_column_major_layout() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let cols = m.to_cols_array();
        // Translation lives in the fourth column
        assert_eq!(&cols[12..15], &[1.0, 2.0, 3.0]);
    }
}
