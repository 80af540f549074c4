//! Renderable objects
//!
//! A [`RenderableObject`] owns the GPU buffers for one mesh, an optional
//! texture and its transform. It refers to a shared shader program by id.
//!
//! Construction is all-or-nothing: the texture image is decoded and the mesh
//! validated before any GPU call, and if a GPU step fails the handles created
//! so far are released before the error is returned.

use std::path::PathBuf;
use std::sync::Arc;

use crate::assets::ImageData;
use crate::foundation::collections::ProgramId;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Quat, Unit, Vec3};
use crate::physics::collision::{CollisionModel, Ray};
use crate::render::backend::{
    BackendError, BufferHandle, BufferKind, GraphicsBackend, TextureHandle, UniformValue, VertexArrayHandle,
};
use crate::render::primitives::mesh::{Mesh, Vertex};
use crate::render::shader::ShaderProgram;
use crate::render::RenderError;
use crate::scene::{Frame, SceneContext};

/// Where an object's texture comes from
#[derive(Debug, Clone, Default)]
pub enum TextureSource {
    /// Untextured
    #[default]
    None,
    /// Image file decoded at construction
    File(PathBuf),
    /// Already decoded pixels
    Image(ImageData),
}

impl TextureSource {
    fn into_image(self) -> Result<Option<ImageData>, RenderError> {
        match self {
            Self::None => Ok(None),
            Self::File(path) => Ok(Some(ImageData::from_file(path)?)),
            Self::Image(image) => Ok(Some(image)),
        }
    }
}

/// GPU objects created for one mesh
#[derive(Debug, Clone, Copy)]
struct GpuResources {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_array: VertexArrayHandle,
    texture: Option<TextureHandle>,
}

#[derive(Debug, Clone, Copy)]
enum Created {
    Buffer(BufferHandle),
    VertexArray(VertexArrayHandle),
    Texture(TextureHandle),
}

impl Created {
    fn release(self, backend: &mut dyn GraphicsBackend) {
        match self {
            Self::Buffer(buffer) => backend.delete_buffer(buffer),
            Self::VertexArray(vertex_array) => backend.delete_vertex_array(vertex_array),
            Self::Texture(texture) => backend.delete_texture(texture),
        }
    }
}

impl GpuResources {
    /// Upload everything, releasing partial work on failure
    fn upload(
        backend: &mut dyn GraphicsBackend,
        mesh: &Mesh,
        image: Option<&ImageData>,
    ) -> Result<Self, BackendError> {
        let mut created = Vec::with_capacity(4);
        let result = Self::upload_tracked(backend, mesh, image, &mut created);
        if result.is_err() {
            log::warn!("Object upload failed, releasing {} GPU object(s)", created.len());
            for handle in created.into_iter().rev() {
                handle.release(backend);
            }
        }
        result
    }

    fn upload_tracked(
        backend: &mut dyn GraphicsBackend,
        mesh: &Mesh,
        image: Option<&ImageData>,
        created: &mut Vec<Created>,
    ) -> Result<Self, BackendError> {
        let vertex_buffer = backend.create_buffer(BufferKind::Vertex, mesh.vertex_bytes())?;
        created.push(Created::Buffer(vertex_buffer));

        let index_buffer = backend.create_buffer(BufferKind::Index, mesh.index_bytes())?;
        created.push(Created::Buffer(index_buffer));

        let vertex_array =
            backend.create_vertex_array(vertex_buffer, index_buffer, &Vertex::attributes(), Vertex::STRIDE)?;
        created.push(Created::VertexArray(vertex_array));

        let texture = match image {
            Some(image) => {
                let texture = backend.create_texture(image)?;
                created.push(Created::Texture(texture));
                Some(texture)
            }
            None => None,
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_array,
            texture,
        })
    }

    fn release(self, backend: &mut dyn GraphicsBackend) {
        if let Some(texture) = self.texture {
            backend.delete_texture(texture);
        }
        backend.delete_vertex_array(self.vertex_array);
        backend.delete_buffer(self.index_buffer);
        backend.delete_buffer(self.vertex_buffer);
    }
}

/// A drawable mesh with its own transform
///
/// The transform is kept decomposed: position is replaced by
/// [`set_position`](Self::set_position), while rotations and scales
/// accumulate. The model matrix is rebuilt from those parts on demand as
/// translation * rotation * scale.
#[derive(Debug)]
pub struct RenderableObject {
    gpu: GpuResources,
    program: ProgramId,
    position: Vec3,
    rotation: Quat,
    scale: f32,
    index_count: usize,
    collision: Option<CollisionModel>,
    released: bool,
}

impl RenderableObject {
    /// Create an object and upload its mesh and texture
    ///
    /// # Arguments
    /// * `context` - Initialized scene; supplies the program and picking settings
    /// * `mesh` - Geometry to upload
    /// * `texture` - Optional texture, decoded before anything touches the GPU
    /// * `program` - Program used to draw the object
    /// * `collidable` - Keep the mesh for ray picking
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        context: &SceneContext,
        mesh: Mesh,
        texture: TextureSource,
        program: ProgramId,
        collidable: bool,
    ) -> Result<Self, RenderError> {
        context.program(program)?;
        let image = texture.into_image()?;

        let gpu = GpuResources::upload(backend, &mesh, image.as_ref())?;
        let index_count = mesh.index_count();

        let collision = collidable.then(|| {
            let settings = &context.config().collision;
            CollisionModel::new(Arc::new(mesh), settings.epsilon, settings.formula)
        });

        log::debug!(
            "Created object: {} indices, textured: {}, collidable: {}",
            index_count,
            gpu.texture.is_some(),
            collidable
        );

        Ok(Self {
            gpu,
            program,
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: 1.0,
            index_count,
            collision,
            released: false,
        })
    }

    /// Rotate about the object's X axis
    pub fn rotate_x(&mut self, degrees: f32) {
        self.rotate(Vec3::x_axis(), degrees);
    }

    /// Rotate about the object's Y axis
    pub fn rotate_y(&mut self, degrees: f32) {
        self.rotate(Vec3::y_axis(), degrees);
    }

    /// Rotate about the object's Z axis
    pub fn rotate_z(&mut self, degrees: f32) {
        self.rotate(Vec3::z_axis(), degrees);
    }

    fn rotate(&mut self, axis: Unit<Vec3>, degrees: f32) {
        self.rotation *= Quat::from_axis_angle(&axis, utils::deg_to_rad(degrees));
        // Keep the quaternion unit length after many small steps
        self.rotation.renormalize_fast();
    }

    /// Multiply the current scale by `factor`
    pub fn scale(&mut self, factor: f32) {
        self.scale *= factor;
    }

    /// Place the object at `position`
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Current position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Accumulated rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Accumulated uniform scale
    pub fn scale_factor(&self) -> f32 {
        self.scale
    }

    /// Number of indices drawn
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Program the object is drawn with
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Texture handle, if textured
    pub fn texture(&self) -> Option<TextureHandle> {
        self.gpu.texture
    }

    /// Vertex array drawn by [`render`](Self::render)
    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.gpu.vertex_array
    }

    /// True when constructed for picking
    pub fn is_collidable(&self) -> bool {
        self.collision.is_some()
    }

    /// Translation * rotation * scale
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position) * self.rotation.to_homogeneous() * Mat4::new_scaling(self.scale)
    }

    /// Draw the object
    pub fn render(&self, backend: &mut dyn GraphicsBackend, frame: &Frame<'_>) -> Result<(), RenderError> {
        self.bind(backend, frame)?;
        self.draw(backend)
    }

    /// Make the program current, bind the texture and upload the model matrix
    pub(crate) fn bind<'f>(
        &self,
        backend: &mut dyn GraphicsBackend,
        frame: &'f Frame<'_>,
    ) -> Result<&'f ShaderProgram, RenderError> {
        let program = frame.context().program(self.program)?;
        backend.use_program(program.handle());
        backend.bind_texture(self.gpu.texture);

        if let Some(location) = program.model_location() {
            backend.set_uniform(location, UniformValue::Mat4(self.model_matrix().to_cols_array()));
        }
        Ok(program)
    }

    /// Issue the indexed draw over the last uploaded index count
    pub(crate) fn draw(&self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        if self.index_count > 0 {
            backend.draw_indexed(self.gpu.vertex_array, self.index_count)?;
        }
        Ok(())
    }

    /// Replace the vertex and index data
    ///
    /// Both buffers are fully re-uploaded. A collidable object picks against
    /// the new geometry from then on.
    ///
    /// If either upload fails the GPU buffers no longer match each other, so
    /// the index count drops to zero and the object draws nothing until the
    /// next successful update.
    pub fn update_buffer_objects(&mut self, backend: &mut dyn GraphicsBackend, mesh: Mesh) -> Result<(), RenderError> {
        let uploaded = backend
            .update_buffer(self.gpu.vertex_buffer, BufferKind::Vertex, mesh.vertex_bytes())
            .and_then(|()| backend.update_buffer(self.gpu.index_buffer, BufferKind::Index, mesh.index_bytes()));
        if let Err(e) = uploaded {
            log::warn!("Geometry upload failed, object disabled until next update: {}", e);
            self.index_count = 0;
            return Err(e.into());
        }
        self.index_count = mesh.index_count();
        log::trace!("Re-uploaded object geometry: {} indices", self.index_count);

        if let Some(collision) = &mut self.collision {
            *collision = collision.with_mesh(Arc::new(mesh));
        }
        Ok(())
    }

    /// Test a world-space ray against the object at its current transform
    pub fn check_for_collision(&self, ray: &Ray) -> bool {
        let Some(collision) = &self.collision else {
            return false;
        };

        let result = collision.hit_test(ray, &self.model_matrix());
        if result.is_hit() {
            log::debug!("Ray hit {} face(s)", result.faces_hit);
        }
        result.is_hit()
    }

    /// Release the GPU handles
    pub fn destroy(mut self, backend: &mut dyn GraphicsBackend) {
        self.gpu.release(backend);
        self.released = true;
    }
}

impl Drop for RenderableObject {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "RenderableObject dropped without destroy(); vertex array {} leaked",
                self.gpu.vertex_array.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::render::backends::{FailPoint, GpuCommand, HeadlessBackend};
    use crate::render::shader::{builtin, ShaderSource};
    use approx::assert_relative_eq;

    fn setup() -> (HeadlessBackend, SceneContext, ProgramId) {
        let mut backend = HeadlessBackend::new();
        let mut context = SceneContext::initialize(&mut backend, SceneConfig::default()).unwrap();
        let program = context
            .shaders_mut()
            .get_or_create(
                &mut backend,
                "mesh",
                &ShaderSource::vertex("mesh.vert", builtin::MESH_VERTEX),
                &ShaderSource::fragment("mesh.frag", builtin::MESH_FRAGMENT),
            )
            .unwrap();
        backend.take_commands();
        (backend, context, program)
    }

    fn cube(backend: &mut HeadlessBackend, context: &SceneContext, program: ProgramId) -> RenderableObject {
        RenderableObject::new(backend, context, Mesh::cube(), TextureSource::None, program, true).unwrap()
    }

    #[test]
    fn test_rotation_accumulates_and_position_replaces() {
        let (mut backend, context, program) = setup();
        let mut object = cube(&mut backend, &context, program);

        object.rotate_y(45.0);
        object.rotate_y(45.0);
        object.set_position(Vec3::new(1.0, 0.0, 0.0));
        object.set_position(Vec3::new(0.0, 2.0, 0.0));

        let expected = Mat4::new_translation(&Vec3::new(0.0, 2.0, 0.0)) * Mat4::rotation_y(utils::deg_to_rad(90.0));
        assert_relative_eq!(object.model_matrix(), expected, epsilon = 1e-5);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_scale_accumulates_and_applies_first() {
        let (mut backend, context, program) = setup();
        let mut object = cube(&mut backend, &context, program);

        object.scale(2.0);
        object.scale(1.5);
        object.set_position(Vec3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(object.scale_factor(), 3.0);

        // Scale, then translate: the unit x point lands at 10 + 3
        let p = object.model_matrix().transform_point(&crate::foundation::math::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 13.0, epsilon = 1e-5);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_many_small_rotations_do_not_drift() {
        let (mut backend, context, program) = setup();
        let mut object = cube(&mut backend, &context, program);

        for _ in 0..3600 {
            object.rotate_z(0.1);
        }
        // 360 degrees in total: back to identity
        assert_relative_eq!(object.rotation().angle(), 0.0, epsilon = 1e-2);
        assert_relative_eq!(object.rotation().quaternion().norm(), 1.0, epsilon = 1e-6);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_render_uploads_model_then_draws() {
        let (mut backend, mut context, program) = setup();
        let mut object = cube(&mut backend, &context, program);
        object.set_position(Vec3::new(0.0, 1.0, 0.0));

        {
            let frame = context.begin_frame(&mut backend).unwrap();
            object.render(&mut backend, &frame).unwrap();
        }

        let model = backend.uniform_values("model");
        assert_eq!(model, vec![UniformValue::Mat4(object.model_matrix().to_cols_array())]);
        assert_eq!(backend.draw_calls(), vec![(object.vertex_array(), 36)]);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_program_without_model_uniform_skips_upload() {
        let (mut backend, mut context, _) = setup();
        let flat = context
            .shaders_mut()
            .get_or_create(
                &mut backend,
                "flat",
                &ShaderSource::vertex("flat.vert", "void main() { gl_Position = vec4(0.0); }"),
                &ShaderSource::fragment("flat.frag", "out vec4 c;\nvoid main() { c = vec4(1.0); }"),
            )
            .unwrap();
        let object = RenderableObject::new(&mut backend, &context, Mesh::cube(), TextureSource::None, flat, false)
            .unwrap();

        let frame = context.begin_frame(&mut backend).unwrap();
        object.render(&mut backend, &frame).unwrap();
        assert!(backend.uniform_values("model").is_empty());
        assert_eq!(backend.draw_calls().len(), 1);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_update_buffer_objects_changes_draw_count() {
        let (mut backend, mut context, program) = setup();
        let mut object = cube(&mut backend, &context, program);

        let triangle = Mesh::new(vec![Vertex::default(); 3], vec![0, 1, 2]).unwrap();
        object.update_buffer_objects(&mut backend, triangle).unwrap();
        assert_eq!(object.index_count(), 3);

        let frame = context.begin_frame(&mut backend).unwrap();
        object.render(&mut backend, &frame).unwrap();
        assert_eq!(backend.draw_calls(), vec![(object.vertex_array(), 3)]);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_failed_index_upload_stops_drawing() {
        let (mut backend, mut context, program) = setup();
        let mut object = cube(&mut backend, &context, program);

        backend.fail_on(FailPoint::IndexUpload);
        let triangle = Mesh::new(vec![Vertex::default(); 3], vec![0, 1, 2]).unwrap();
        let err = object.update_buffer_objects(&mut backend, triangle).unwrap_err();
        assert!(matches!(err, RenderError::Backend(_)));
        assert_eq!(object.index_count(), 0);

        let frame = context.begin_frame(&mut backend).unwrap();
        object.render(&mut backend, &frame).unwrap();
        assert!(backend.draw_calls().is_empty());

        backend.clear_failures();
        object.update_buffer_objects(&mut backend, Mesh::cube()).unwrap();
        assert_eq!(object.index_count(), 36);
        object.destroy(&mut backend);
    }

    #[test]
    fn test_collision_only_when_collidable() {
        let (mut backend, context, program) = setup();
        let ray = Ray::new(Vec3::new(0.0, 0.1, 5.0), Vec3::new(0.0, 0.0, -1.0));

        let mut pickable = cube(&mut backend, &context, program);
        let solid =
            RenderableObject::new(&mut backend, &context, Mesh::cube(), TextureSource::None, program, false).unwrap();

        assert!(pickable.check_for_collision(&ray));
        assert!(!solid.check_for_collision(&ray));

        // Moving the pickable cube out of the ray's path
        pickable.set_position(Vec3::new(5.0, 0.0, 0.0));
        assert!(!pickable.check_for_collision(&ray));

        pickable.destroy(&mut backend);
        solid.destroy(&mut backend);
    }

    #[test]
    fn test_missing_texture_fails_before_gpu() {
        let (mut backend, context, program) = setup();
        let missing = std::env::temp_dir().join("gl_scene_missing_texture.png");

        let err = RenderableObject::new(
            &mut backend,
            &context,
            Mesh::cube(),
            TextureSource::File(missing),
            program,
            false,
        )
        .unwrap_err();

        assert!(matches!(err, RenderError::Asset(crate::assets::AssetError::ResourceNotFound { .. })));
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_failed_texture_upload_rolls_back() {
        let (mut backend, context, program) = setup();
        let live_before = backend.live_buffers();
        backend.fail_on(FailPoint::Texture);

        let result = RenderableObject::new(
            &mut backend,
            &context,
            Mesh::cube(),
            TextureSource::Image(ImageData::solid_color(2, 2, [255, 0, 0, 255])),
            program,
            false,
        );

        assert!(matches!(result, Err(RenderError::Backend(_))));
        assert_eq!(backend.live_buffers(), live_before);
        assert_eq!(backend.live_vertex_arrays(), 0);
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let (mut backend, context, program) = setup();
        let object = RenderableObject::new(
            &mut backend,
            &context,
            Mesh::cube(),
            TextureSource::Image(ImageData::solid_color(1, 1, [255; 4])),
            program,
            false,
        )
        .unwrap();
        let texture = object.texture().unwrap();

        object.destroy(&mut backend);
        assert_eq!(backend.live_vertex_arrays(), 0);
        assert_eq!(backend.live_textures(), 0);
        assert!(backend.commands().contains(&GpuCommand::DeleteTexture(texture)));
    }
}
