//! Ray/triangle picking
//!
//! [`CollisionModel`] keeps a shared reference to the mesh a renderable object
//! was built from and tests world-space rays against every triangle of it,
//! after transforming the vertices by the object's current model matrix.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::render::primitives::mesh::Mesh;

/// A ray for picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray, normalizing the direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// How the hit distance `t` is derived once a hit is inside the triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntersectionFormula {
    /// `t = (e2 · Q) / det`
    #[default]
    Standard,
    /// `t = (e2 · Q) + 1/det`
    ///
    /// Reproduces pick results of older scenes that relied on this variant. It
    /// is not a distance and accepts hits the standard form rejects.
    LegacyAdditive,
}

/// A triangle in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First corner
    pub v0: Vec3,
    /// Second corner
    pub v1: Vec3,
    /// Third corner
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Centroid of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Möller-Trumbore ray/triangle intersection
    ///
    /// Returns `t` when the ray hits with `t > epsilon`. Rays whose determinant
    /// magnitude is below `epsilon` are treated as parallel and miss.
    pub fn intersect_ray(&self, ray: &Ray, epsilon: f32, formula: IntersectionFormula) -> Option<f32> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let p = ray.direction.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() < epsilon {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - self.v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = ray.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = match formula {
            IntersectionFormula::Standard => edge2.dot(&q) * inv_det,
            IntersectionFormula::LegacyAdditive => edge2.dot(&q) + inv_det,
        };

        (t > epsilon).then_some(t)
    }
}

/// Outcome of testing a ray against a whole model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitTest {
    /// Number of triangles the ray passed through
    pub faces_hit: usize,
}

impl HitTest {
    /// True when at least one face was hit
    pub fn is_hit(&self) -> bool {
        self.faces_hit > 0
    }
}

/// Picking geometry for one renderable object
#[derive(Debug, Clone)]
pub struct CollisionModel {
    mesh: Arc<Mesh>,
    epsilon: f32,
    formula: IntersectionFormula,
}

impl CollisionModel {
    /// Create a collision model over `mesh`
    pub fn new(mesh: Arc<Mesh>, epsilon: f32, formula: IntersectionFormula) -> Self {
        Self { mesh, epsilon, formula }
    }

    /// Mesh the model tests against
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Same settings over different geometry
    #[must_use]
    pub fn with_mesh(&self, mesh: Arc<Mesh>) -> Self {
        Self {
            mesh,
            epsilon: self.epsilon,
            formula: self.formula,
        }
    }

    /// Triangles in world space for the given model matrix
    pub fn triangles<'a>(&'a self, model: &'a Mat4) -> impl Iterator<Item = Triangle> + 'a {
        let vertices = self.mesh.vertices();
        let world = move |index: u16| -> Vec3 {
            model
                .transform_point(&Point3::from(vertices[usize::from(index)].position))
                .coords
        };

        self.mesh
            .indices()
            .chunks_exact(3)
            .map(move |tri| Triangle::new(world(tri[0]), world(tri[1]), world(tri[2])))
    }

    /// Test `ray` against every triangle, counting the faces hit
    pub fn hit_test(&self, ray: &Ray, model: &Mat4) -> HitTest {
        let faces_hit = self
            .triangles(model)
            .filter(|tri| tri.intersect_ray(ray, self.epsilon, self.formula).is_some())
            .count();

        HitTest { faces_hit }
    }
}
