//! Interfaces to the scene the strands and masters come from.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strix_math::{Mat4, Quat, Vec3};

use crate::attribute::{conform, UserAttribute};
use crate::hair::InstancingSettings;
use crate::mesh::MasterShape;

/// Stable identity of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Polymesh,
    Hair,
    Model,
    Light,
    Procedural,
    Null,
}

impl ObjectKind {
    /// Lights and procedurals are parameterized per copy, never cloned from
    /// a shared bent template.
    pub fn is_cacheable(self) -> bool {
        !matches!(self, ObjectKind::Light | ObjectKind::Procedural)
    }
}

/// Source of master geometry and hierarchy.
pub trait MasterShapeProvider {
    fn kind(&self, id: ObjectId) -> Option<ObjectKind>;

    fn name(&self, id: ObjectId) -> Option<&str>;

    /// Direct children of `id` with their transforms relative to it.
    fn children(&self, id: ObjectId, time: f64) -> Vec<(ObjectId, Mat4)>;

    /// Transform relative to the parent.
    fn local_transform(&self, id: ObjectId, time: f64) -> Mat4;

    fn global_transform(&self, id: ObjectId, time: f64) -> Mat4;

    /// Geometry of `id` evaluated at `time`, `None` for objects without any.
    fn shape(&self, id: ObjectId, time: f64) -> Option<MasterShape>;
}

/// Per-strand and per-vertex attributes of a hair object at one time.
///
/// Per-vertex channels are flat across strands in `vertex_counts` order;
/// empty means absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandSample {
    pub vertex_counts: Vec<u32>,
    pub positions: Vec<Vec3>,
    pub radii: Vec<f32>,
    pub orientations: Vec<Quat>,
    pub velocities: Vec<Vec3>,
    /// Named per-strand weights
    pub weight_maps: HashMap<String, Vec<f32>>,
    /// Named per-strand RGBA colors encoding a direction
    pub tangent_maps: HashMap<String, Vec<[f32; 4]>>,
    /// Explicit master index per strand
    pub master_indices: Vec<u32>,
}

impl StrandSample {
    pub fn strand_count(&self) -> usize {
        self.vertex_counts.len()
    }

    pub fn total_vertices(&self) -> usize {
        self.vertex_counts.iter().map(|&c| c as usize).sum()
    }

    /// Pad or truncate every present channel to the counts implied by
    /// `vertex_counts`. Returns true if anything was changed.
    pub fn conform(&mut self, object: &str) -> bool {
        let vertices = self.total_vertices();
        let strands = self.strand_count();
        let mut changed = false;

        let last = self.positions.last().copied().unwrap_or(Vec3::ZERO);
        changed |= conform(
            &mut self.positions,
            vertices,
            last,
            &format!("{} positions", object),
        );
        if !self.radii.is_empty() {
            changed |= conform(&mut self.radii, vertices, 0.0, &format!("{} radii", object));
        }
        if !self.orientations.is_empty() {
            changed |= conform(
                &mut self.orientations,
                vertices,
                Quat::IDENTITY,
                &format!("{} orientations", object),
            );
        }
        if !self.velocities.is_empty() {
            changed |= conform(
                &mut self.velocities,
                vertices,
                Vec3::ZERO,
                &format!("{} velocities", object),
            );
        }
        for (name, values) in self.weight_maps.iter_mut() {
            changed |= conform(values, strands, 0.0, &format!("{} weight map {}", object, name));
        }
        for (name, values) in self.tangent_maps.iter_mut() {
            changed |= conform(
                values,
                strands,
                [0.5, 0.5, 0.5, 1.0],
                &format!("{} tangent map {}", object, name),
            );
        }
        if !self.master_indices.is_empty() {
            changed |= conform(
                &mut self.master_indices,
                strands,
                0,
                &format!("{} master indices", object),
            );
        }
        changed
    }
}

/// Source of strands and per-object export settings.
pub trait AttributeProvider {
    /// Hair objects to export, in scene order.
    fn hair_objects(&self) -> Vec<ObjectId>;

    fn strand_sample(&self, id: ObjectId, time: f64) -> Option<StrandSample>;

    /// Instancing settings, `None` for plain curve export.
    fn instancing(&self, id: ObjectId) -> Option<InstancingSettings>;

    fn user_attributes(&self, id: ObjectId) -> Vec<UserAttribute>;
}
