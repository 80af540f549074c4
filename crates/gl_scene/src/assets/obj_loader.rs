//! OBJ file loader for 3D models
//!
//! Supports the subset of Wavefront OBJ the scene needs: `o`, `v`, `vt`, `vn`
//! and `f` records. Face corners may be `v`, `v/t`, `v/t/n` or `v//n`.
//!
//! Conventions:
//! - Texture V coordinates are flipped on load (`v' = 1 - v`) so texture space
//!   has a top-left origin, matching image rows and the font atlas.
//! - Numeric fields are parsed permissively: a token that is missing or does not
//!   parse becomes `0`. For coordinates this never aborts a load. A face index
//!   that does not parse also becomes `0`, which is out of range once converted
//!   to 0-based and fails with [`MeshError::IndexOutOfRange`].
//! - An empty index field (`1//3`) means "not given" and resolves to index 0.
//!   Any written index, including `1`, is converted from 1-based to 0-based.
//! - If the file has no texture coordinates or no normals, a single zero entry
//!   is added so index 0 always resolves.
//! - Corners are deduplicated on their (position, texcoord, normal) triple and
//!   the index buffer keeps face order.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::assets::read_to_string;
use crate::render::primitives::mesh::{Mesh, MeshError, Vertex, MAX_VERTICES};

/// Loader for OBJ-like mesh text
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file and return a mesh
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, MeshError> {
        let path = path.as_ref();
        let source = read_to_string(path)?;
        log::debug!("Parsing mesh {:?} ({} bytes)", path, source.len());
        Self::parse_str(&source)
    }

    /// Parse OBJ text already in memory
    pub fn parse_str(source: &str) -> Result<Mesh, MeshError> {
        let mut data = ObjData::parse(source);

        if data.tex_coords.is_empty() {
            data.tex_coords.push([0.0, 0.0]);
        }
        if data.normals.is_empty() {
            data.normals.push([0.0, 0.0, 0.0]);
        }

        data.build_mesh()
    }
}

/// One face corner as written in the file: 1-based indices, `None` when the field was empty
#[derive(Debug, Clone, Copy)]
struct FaceCorner {
    position: i64,
    tex_coord: Option<i64>,
    normal: Option<i64>,
    line: usize,
}

#[derive(Debug, Default)]
struct ObjData {
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    /// Triangle corners in draw order
    corners: Vec<FaceCorner>,
}

impl ObjData {
    fn parse(source: &str) -> Self {
        let mut data = Self::default();

        for (line_index, raw_line) in source.lines().enumerate() {
            let line_number = line_index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };

            match keyword {
                "o" => {
                    let name = line[1..].trim();
                    log::info!("Loading object {}...", name);
                }
                "v" => {
                    data.positions.push([
                        parse_or_zero(parts.next()),
                        parse_or_zero(parts.next()),
                        parse_or_zero(parts.next()),
                    ]);
                }
                "vt" => {
                    let u: f32 = parse_or_zero(parts.next());
                    let v: f32 = parse_or_zero(parts.next());
                    data.tex_coords.push([u, 1.0 - v]);
                }
                "vn" => {
                    data.normals.push([
                        parse_or_zero(parts.next()),
                        parse_or_zero(parts.next()),
                        parse_or_zero(parts.next()),
                    ]);
                }
                "f" => data.push_face(parts, line_number),
                other => log::trace!("line {}: ignoring '{}' record", line_number, other),
            }
        }

        data
    }

    fn push_face<'a>(&mut self, fields: impl Iterator<Item = &'a str>, line: usize) {
        let face: Vec<FaceCorner> = fields.map(|field| parse_corner(field, line)).collect();

        if face.len() < 3 {
            log::warn!("line {}: face with {} corners skipped", line, face.len());
            return;
        }

        // Fan triangulation; a triangle passes through unchanged
        for i in 1..face.len() - 1 {
            self.corners.extend_from_slice(&[face[0], face[i], face[i + 1]]);
        }
    }

    fn build_mesh(&self) -> Result<Mesh, MeshError> {
        let mut lookup: HashMap<(usize, usize, usize), u16> = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(self.corners.len());

        for corner in &self.corners {
            let key = (
                resolve(Some(corner.position), self.positions.len(), "position", corner.line)?,
                resolve(corner.tex_coord, self.tex_coords.len(), "texture", corner.line)?,
                resolve(corner.normal, self.normals.len(), "normal", corner.line)?,
            );

            let index = match lookup.get(&key) {
                Some(&index) => index,
                None => {
                    if vertices.len() >= MAX_VERTICES {
                        return Err(MeshError::CapacityExceeded { limit: MAX_VERTICES });
                    }
                    let index = vertices.len() as u16;
                    vertices.push(Vertex::new(
                        self.positions[key.0],
                        self.tex_coords[key.1],
                        self.normals[key.2],
                    ));
                    lookup.insert(key, index);
                    index
                }
            };
            indices.push(index);
        }

        log::debug!(
            "Built mesh: {} vertices, {} indices from {} positions",
            vertices.len(),
            indices.len(),
            self.positions.len()
        );

        Mesh::new(vertices, indices)
    }
}

/// Parse a number, falling back to zero for missing or malformed tokens
fn parse_or_zero<T: FromStr + Default>(token: Option<&str>) -> T {
    token.and_then(|t| t.parse().ok()).unwrap_or_default()
}

fn parse_corner(field: &str, line: usize) -> FaceCorner {
    let mut slots = field.split('/');
    let position = parse_or_zero(slots.next());
    let tex_coord = slots.next().filter(|s| !s.is_empty()).map(|s| parse_or_zero(Some(s)));
    let normal = slots.next().filter(|s| !s.is_empty()).map(|s| parse_or_zero(Some(s)));

    FaceCorner {
        position,
        tex_coord,
        normal,
        line,
    }
}

/// Convert a 1-based reference to a 0-based list index; absent references use 0
fn resolve(index: Option<i64>, available: usize, kind: &'static str, line: usize) -> Result<usize, MeshError> {
    let Some(one_based) = index else {
        return Ok(0);
    };

    usize::try_from(one_based - 1)
        .ok()
        .filter(|&i| i < available)
        .ok_or(MeshError::IndexOutOfRange {
            line,
            kind,
            index: one_based,
            available,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use std::collections::HashSet;
    use std::fmt::Write as _;

    const QUAD: &str = "\
# two triangles sharing an edge
o Quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    #[test]
    fn test_unique_corners_become_vertices() {
        let mesh = ObjLoader::parse_str(QUAD).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
        assert!(mesh.indices().iter().all(|&i| usize::from(i) < mesh.vertex_count()));
    }

    #[test]
    fn test_vertex_count_equals_distinct_keys() {
        // Same position with two different texture coordinates gives two vertices
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 1
f 1/1 2/1 3/1
f 1/2 2/1 3/1
";
        let mesh = ObjLoader::parse_str(source).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_texture_v_is_flipped() {
        let source = "\
v 0 0 0
vt 0.25 0.1
vt 0.5 0.8
f 1/1 1/2 1/1
";
        let mesh = ObjLoader::parse_str(source).unwrap();
        let flipped: Vec<[f32; 2]> = mesh.vertices().iter().map(|v| v.tex_coord).collect();
        assert_eq!(flipped, vec![[0.25, 1.0 - 0.1], [0.5, 1.0 - 0.8]]);
    }

    #[test]
    fn test_index_order_follows_face_order() {
        let source = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 3 2 1
f 4 3 1
f 1 2 4
";
        let mesh = ObjLoader::parse_str(source).unwrap();

        // Map each emitted index back to the position it came from
        let positions: Vec<[f32; 3]> = mesh
            .indices()
            .iter()
            .map(|&i| mesh.vertices()[usize::from(i)].position)
            .collect();
        let expected = [
            [1.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
        ];
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_vertex_only_faces_use_placeholders() {
        let mesh = ObjLoader::parse_str("v 1 2 3\nv 4 5 6\nv 7 8 9\nf 1 2 3\n").unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        for vertex in mesh.vertices() {
            assert_eq!(vertex.tex_coord, [0.0, 0.0]);
            assert_eq!(vertex.normal, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_empty_texture_slot_defaults_to_first_entry() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0.1 0.1
vt 0.9 0.9
vn 0 0 1
vn 0 1 0
f 1//2 2/2/2 3/1/1
";
        let mesh = ObjLoader::parse_str(source).unwrap();
        let v = mesh.vertices();

        // Empty slot resolves to texcoord 0; written "1" also means the first entry
        assert_eq!(v[0].tex_coord, [0.1, 1.0 - 0.1]);
        assert_eq!(v[0].normal, [0.0, 1.0, 0.0]);
        assert_eq!(v[1].tex_coord, [0.9, 1.0 - 0.9]);
        assert_eq!(v[2].tex_coord, [0.1, 1.0 - 0.1]);
        assert_eq!(v[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_written_zero_index_is_not_treated_as_missing() {
        let err = ObjLoader::parse_str("v 0 0 0\nvt 0 0\nf 1/0/1 1/1/1 1/1/1\n").unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfRange {
                line: 3,
                kind: "texture",
                index: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_unparsable_numbers_become_zero() {
        let source = "\
v 1.5 abc 2.5
v 1.0
vt nope 0.25
v 0 0 1
f 1/1 2/1 3/1
";
        let mesh = ObjLoader::parse_str(source).unwrap();
        let v = mesh.vertices();

        assert_eq!(v[0].position, [1.5, 0.0, 2.5]);
        assert_eq!(v[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(v[0].tex_coord, [0.0, 0.75]);
    }

    #[test]
    fn test_unparsable_face_index_fails_load() {
        let err = ObjLoader::parse_str("v 0 0 0\nf x 1 1\n").unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfRange {
                line: 2,
                kind: "position",
                index: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_position_out_of_range_is_reported() {
        let err = ObjLoader::parse_str("v 0 0 0\nf 1 2 1\n").unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfRange {
                kind: "position",
                index: 2,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_polygons_are_fan_triangulated() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\nf 1 2\n";
        let mesh = ObjLoader::parse_str(source).unwrap();
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_capacity_exceeded_instead_of_wrapping() {
        // 65538 distinct positions, each used once: one more vertex than u16 can address
        let count = MAX_VERTICES + 3;
        let mut source = String::with_capacity(count * 24);
        for i in 0..count {
            writeln!(source, "v {i} 0 0").unwrap();
        }
        for tri in 0..count / 3 {
            let base = tri * 3 + 1;
            writeln!(source, "f {} {} {}", base, base + 1, base + 2).unwrap();
        }

        let err = ObjLoader::parse_str(&source).unwrap_err();
        assert!(matches!(err, MeshError::CapacityExceeded { limit: MAX_VERTICES }));
    }

    #[test]
    fn test_largest_mesh_still_loads() {
        // Exactly 65535 unique vertices is allowed
        let count = MAX_VERTICES;
        let mut source = String::new();
        for i in 0..count {
            writeln!(source, "v {i} 0 0").unwrap();
        }
        for tri in 0..count / 3 {
            let base = tri * 3 + 1;
            writeln!(source, "f {} {} {}", base, base + 1, base + 2).unwrap();
        }

        let mesh = ObjLoader::parse_str(&source).unwrap();
        assert_eq!(mesh.vertex_count(), MAX_VERTICES);
        let distinct: HashSet<u16> = mesh.indices().iter().copied().collect();
        assert_eq!(distinct.len(), MAX_VERTICES);
    }

    #[test]
    fn test_missing_file_is_resource_not_found() {
        let path = std::env::temp_dir().join("gl_scene_does_not_exist.obj");
        match ObjLoader::load_obj(&path) {
            Err(MeshError::Asset(AssetError::ResourceNotFound { path: attempted })) => {
                assert_eq!(attempted, path);
            }
            other => panic!("expected ResourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("gl_scene_quad_{}.obj", std::process::id()));
        std::fs::write(&path, QUAD).unwrap();
        let mesh = ObjLoader::load_obj(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(mesh.unwrap().triangle_count(), 2);
    }
}
