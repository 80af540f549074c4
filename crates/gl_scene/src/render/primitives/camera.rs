//! # Scene Camera
//!
//! Perspective camera with OpenGL conventions and screen-space picking.
//!
//! ## Conventions
//! - Right-handed, Y-up world space; the camera looks down -Z in view space
//! - Clip-space depth in `[-1, 1]`
//! - Screen coordinates in pixels with the origin at the top-left corner
//!
//! The camera is plain data. Every mutation sets a dirty flag; the scene
//! context uploads [`CameraUniform`] at the start of the next frame.

use bytemuck::{Pod, Zeroable};

use crate::config::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec2, Vec3, Vec4};
use crate::physics::collision::Ray;

/// Uniform block binding point of the camera block
pub const CAMERA_BINDING: u32 = 1;

/// GPU layout of the camera uniform block: view then projection
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    /// View matrix, column-major
    pub view: [f32; 16],
    /// Projection matrix, column-major
    pub projection: [f32; 16],
}

/// Perspective camera
///
/// Position and target are in world space. Matrices are computed on demand
/// from the current state, so there is no cached matrix to drift.
#[derive(Debug, Clone)]
pub struct Camera {
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    fov: f32,
    near: f32,
    far: f32,
    window_width: u32,
    window_height: u32,
    dirty: bool,
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `eye` - Camera location in world space
    /// * `target` - Point the camera looks at
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `near` / `far` - Clip plane distances (`0 < near < far`)
    /// * `window_width` / `window_height` - Drawable size in pixels, used for the
    ///   aspect ratio and for converting pick coordinates
    pub fn new(
        eye: Vec3,
        target: Vec3,
        fov_degrees: f32,
        near: f32,
        far: f32,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            eye,
            target,
            up: Vec3::y(),
            fov: utils::deg_to_rad(fov_degrees),
            near,
            far,
            window_width,
            window_height,
            dirty: true,
        }
    }

    /// Create a camera from configuration
    pub fn from_config(config: &CameraConfig, window_width: u32, window_height: u32) -> Self {
        Self::new(
            Vec3::from(config.eye),
            Vec3::from(config.target),
            config.fov_degrees,
            config.near,
            config.far,
            window_width,
            window_height,
        )
    }

    /// Move the eye in X and Y; the target stays where it is
    pub fn pan(&mut self, delta: Vec2) {
        self.eye.x += delta.x;
        self.eye.y += delta.y;
        self.dirty = true;
        log::trace!("Camera panned to {:?}", self.eye);
    }

    /// Move the eye along Z
    pub fn zoom(&mut self, distance: f32) {
        self.eye.z += distance;
        self.dirty = true;
        log::trace!("Camera zoomed to {:?}", self.eye);
    }

    /// Place the eye at a new location
    pub fn set_position(&mut self, position: Vec3) {
        self.eye = position;
        self.dirty = true;
    }

    /// Update the drawable size; zero sizes (minimized windows) are ignored
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring camera resize to {}x{}", width, height);
            return;
        }
        self.window_width = width;
        self.window_height = height;
        self.dirty = true;
    }

    /// Eye location in world space
    pub fn location(&self) -> Vec3 {
        self.eye
    }

    /// Look-at target in world space
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Drawable size in pixels
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        self.window_width as f32 / self.window_height.max(1) as f32
    }

    /// World to view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.eye, self.target, self.up)
    }

    /// View to clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect(), self.near, self.far)
    }

    /// Data for the camera uniform block
    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view: self.view_matrix().to_cols_array(),
            projection: self.projection_matrix().to_cols_array(),
        }
    }

    /// True when the camera changed since the last upload
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether it was set
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// World-space direction through a pixel
    ///
    /// `x` and `y` are window pixels from the top-left corner. The pixel is put
    /// on the near plane in clip space, unprojected to a view-space direction
    /// and rotated into world space.
    ///
    /// # Returns
    /// Normalized direction, or `None` if a matrix cannot be inverted
    pub fn get_raycast(&self, x: f32, y: f32) -> Option<Vec3> {
        let width = self.window_width as f32;
        let height = self.window_height as f32;

        let ndc_x = 2.0 * x / width - 1.0;
        let ndc_y = -(2.0 * y / height - 1.0);
        let ray_clip = Vec4::new(ndc_x, ndc_y, -1.0, 1.0);

        let mut ray_eye = self.projection_matrix().try_inverse()? * ray_clip;
        ray_eye.z = -1.0;
        ray_eye.w = 0.0;

        let ray_world = self.view_matrix().try_inverse()? * ray_eye;
        let direction = ray_world.xyz();
        (direction.norm() > f32::EPSILON).then(|| direction.normalize())
    }

    /// Pick ray from the eye through a pixel
    pub fn pick_ray(&self, x: f32, y: f32) -> Option<Ray> {
        self.get_raycast(x, y).map(|direction| Ray::new(self.eye, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;

    fn default_camera() -> Camera {
        Camera::from_config(&CameraConfig::default(), 1600, 900)
    }

    /// Project a world point to window pixels, top-left origin
    fn to_screen(camera: &Camera, point: Vec3) -> (f32, f32) {
        let clip = camera.projection_matrix() * camera.view_matrix() * Point3::from(point).to_homogeneous();
        let ndc = clip.xyz() / clip.w;
        let (w, h) = camera.window_size();
        ((ndc.x + 1.0) * 0.5 * w as f32, (1.0 - ndc.y) * 0.5 * h as f32)
    }

    #[test]
    fn test_center_pixel_looks_at_target() {
        let camera = default_camera();
        let dir = camera.get_raycast(800.0, 450.0).unwrap();
        assert_relative_eq!(dir, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_top_left_pixel_points_up_and_left() {
        let camera = default_camera();
        let dir = camera.get_raycast(0.0, 0.0).unwrap();
        assert!(dir.x < 0.0);
        assert!(dir.y > 0.0);
        assert!(dir.z < 0.0);
        assert_relative_eq!(dir.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_raycast_passes_through_projected_point() {
        let mut camera = default_camera();
        camera.pan(Vec2::new(0.5, -0.25));

        let point = Vec3::new(0.7, 0.3, -1.0);
        let (x, y) = to_screen(&camera, point);
        let ray = camera.pick_ray(x, y).unwrap();

        let expected = (point - camera.location()).normalize();
        assert_relative_eq!(ray.direction, expected, epsilon = 1e-4);
        assert_eq!(ray.origin, camera.location());
    }

    #[test]
    fn test_pan_and_zoom_move_eye_only() {
        let mut camera = default_camera();
        camera.take_dirty();

        camera.pan(Vec2::new(1.0, 2.0));
        camera.zoom(-1.5);
        assert_relative_eq!(camera.location(), Vec3::new(1.0, 2.0, 3.5));
        assert_eq!(camera.target(), Vec3::zeros());
        assert!(camera.take_dirty());
        assert!(!camera.is_dirty());

        camera.set_position(Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(camera.location(), Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn test_resize_changes_aspect_and_pick_mapping() {
        let mut camera = default_camera();
        camera.resize(800, 800);
        assert_relative_eq!(camera.aspect(), 1.0);

        let dir = camera.get_raycast(400.0, 400.0).unwrap();
        assert_relative_eq!(dir, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);

        camera.resize(0, 600);
        assert_eq!(camera.window_size(), (800, 800));
    }

    #[test]
    fn test_uniform_is_two_column_major_matrices() {
        let camera = default_camera();
        let uniform = camera.uniform();
        assert_eq!(std::mem::size_of::<CameraUniform>(), 128);
        assert_eq!(uniform.view, camera.view_matrix().to_cols_array());
        // Eye at z = 5 looking at origin: view translates by -5 along z
        assert_relative_eq!(uniform.view[14], -5.0, epsilon = 1e-6);
    }
}
