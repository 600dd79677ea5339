//! Master shape geometry.
//!
//! Shapes are read-only once handed out by the provider. Instances keep a
//! shared reference and copy only what they transform.

use serde::{Deserialize, Serialize};
use strix_math::{Mat4, Vec3};

use crate::output::catmull_rom_points;
use crate::provider::ObjectId;

/// Polygon soup as the renderer stores it: positions and normals indexed per
/// face-vertex through separate index lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Normals, referenced by `normal_indices` (may be shared or face-varying)
    pub normals: Vec<Vec3>,

    /// Position index for every face-vertex
    pub vertex_indices: Vec<u32>,

    /// Normal index for every face-vertex
    pub normal_indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from positions and indices, optionally with indexed normals.
    pub fn new(
        positions: Vec<Vec3>,
        vertex_indices: Vec<u32>,
        normals: Option<(Vec<Vec3>, Vec<u32>)>,
    ) -> Self {
        let (normals, normal_indices) = normals.unwrap_or_default();
        Self {
            positions,
            normals,
            vertex_indices,
            normal_indices,
        }
    }

    /// Get vertex count.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check if this mesh has normals.
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && !self.normal_indices.is_empty()
    }
}

/// What a master shape is, as far as bending goes.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    Polymesh,
    /// Curves in catmull-rom layout. `num_points` counts the duplicated
    /// end points; `radius` has one value per original point.
    Curves {
        num_points: Vec<u32>,
        radius: Vec<f32>,
    },
}

/// A master shape evaluated at one time.
#[derive(Clone, Debug, PartialEq)]
pub struct MasterShape {
    pub id: ObjectId,
    pub name: String,
    pub kind: ShapeKind,
    pub mesh: Mesh,
    /// World transform at the evaluation time
    pub transform: Mat4,
}

impl MasterShape {
    pub fn polymesh(id: ObjectId, name: impl Into<String>, mesh: Mesh, transform: Mat4) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ShapeKind::Polymesh,
            mesh,
            transform,
        }
    }

    /// Curves master from raw strand points, `vertex_counts[i]` points per
    /// strand. Each strand is stored with its ends duplicated, as curves are
    /// exported.
    pub fn curves(
        id: ObjectId,
        name: impl Into<String>,
        points: &[Vec3],
        vertex_counts: &[u32],
        radius: Vec<f32>,
        transform: Mat4,
    ) -> Self {
        let mut positions = Vec::with_capacity(points.len() + 2 * vertex_counts.len());
        let mut num_points = Vec::with_capacity(vertex_counts.len());
        let mut offset = 0;
        for &count in vertex_counts {
            let end = offset + count as usize;
            let curve = catmull_rom_points(points.get(offset..end).unwrap_or_default());
            num_points.push(curve.len() as u32);
            positions.extend(curve);
            offset = end;
        }

        Self {
            id,
            name: name.into(),
            kind: ShapeKind::Curves { num_points, radius },
            mesh: Mesh::new(positions, Vec::new(), None),
            transform,
        }
    }

    pub fn is_curves(&self) -> bool {
        matches!(self.kind, ShapeKind::Curves { .. })
    }
}
