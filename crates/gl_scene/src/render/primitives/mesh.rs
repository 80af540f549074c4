//! Mesh representation for 3D models
//!
//! Contains the GPU vertex layout and the indexed mesh container shared by the
//! OBJ loader, the text layout engine and the renderable objects.
//!
//! Indices are 16-bit, so a mesh can address at most [`MAX_VERTICES`] vertices.
//! Every constructor enforces that limit and the index bounds up front, before
//! anything is handed to the GPU.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::assets::AssetError;
use crate::foundation::math::Vec3;

/// Largest vertex count addressable by `u16` indices
pub const MAX_VERTICES: usize = u16::MAX as usize;

/// Errors produced while building or validating a mesh
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh source could not be read
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// More unique vertices than 16-bit indices can address
    #[error("mesh needs more than {limit} unique vertices")]
    CapacityExceeded {
        /// Maximum supported vertex count
        limit: usize,
    },

    /// A face references a position/texcoord/normal that does not exist
    #[error("line {line}: {kind} index {index} out of range (have {available})")]
    IndexOutOfRange {
        /// 1-based source line
        line: usize,
        /// Which attribute list was indexed
        kind: &'static str,
        /// Index as written in the source
        index: i64,
        /// Length of the attribute list
        available: usize,
    },

    /// An index buffer entry points past the vertex buffer
    #[error("index {index} is out of range for {vertex_count} vertices")]
    InvalidIndex {
        /// Offending index value
        index: u16,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },
}

/// Vertex attribute description consumed by the graphics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader attribute location
    pub location: u32,
    /// Number of `f32` components
    pub components: i32,
    /// Byte offset inside [`Vertex`]
    pub offset: i32,
}

/// Interleaved vertex: position, texture coordinate, normal
///
/// The field order is the GPU attribute order; [`Vertex::STRIDE`] and the offset
/// constants are what the vertex array layout is built from.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Texture coordinate, top-left origin
    pub tex_coord: [f32; 2],
    /// Normal vector
    pub normal: [f32; 3],
}

impl Vertex {
    /// Size of one vertex in bytes
    pub const STRIDE: i32 = size_of::<Self>() as i32;

    /// Byte offset of the position attribute
    pub const POSITION_OFFSET: i32 = offset_of!(Self, position) as i32;

    /// Byte offset of the texture coordinate attribute
    pub const TEX_COORD_OFFSET: i32 = offset_of!(Self, tex_coord) as i32;

    /// Byte offset of the normal attribute
    pub const NORMAL_OFFSET: i32 = offset_of!(Self, normal) as i32;

    /// Create a new vertex
    pub const fn new(position: [f32; 3], tex_coord: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            tex_coord,
            normal,
        }
    }

    /// Attribute layout: location 0 position, 1 texture coordinate, 2 normal
    pub const fn attributes() -> [VertexAttribute; 3] {
        [
            VertexAttribute {
                location: 0,
                components: 3,
                offset: Self::POSITION_OFFSET,
            },
            VertexAttribute {
                location: 1,
                components: 2,
                offset: Self::TEX_COORD_OFFSET,
            },
            VertexAttribute {
                location: 2,
                components: 3,
                offset: Self::NORMAL_OFFSET,
            },
        ]
    }

    /// Position as a vector
    pub fn position_vec(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

/// Indexed triangle mesh with 16-bit indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
}

impl Mesh {
    /// Create a mesh, checking the vertex limit and that every index is in range
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u16>) -> Result<Self, MeshError> {
        if vertices.len() > MAX_VERTICES {
            return Err(MeshError::CapacityExceeded { limit: MAX_VERTICES });
        }
        if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= vertices.len()) {
            return Err(MeshError::InvalidIndex {
                index,
                vertex_count: vertices.len(),
            });
        }
        Ok(Self { vertices, indices })
    }

    /// Vertex data
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index data, three per triangle
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of complete triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index bytes for upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Textured unit cube centred on the origin
    ///
    /// 24 vertices (four per face so each face gets its own normal and full
    /// texture), 36 indices, counter-clockwise front faces.
    pub fn cube() -> Self {
        // (normal, u axis, v axis) with u x v == normal
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        // (u sign, v sign, tex coord) walking the face counter-clockwise
        const CORNERS: [(f32, f32, [f32; 2]); 4] = [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u, v) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let base = vertices.len() as u16;
            for (su, sv, tex_coord) in CORNERS {
                let position = (n + u * su + v * sv) * 0.5;
                vertices.push(Vertex::new(position.into(), tex_coord, normal));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }
}
