//! Master shapes prepared for bending, and the bend itself.
//!
//! A [`StrandInstance`] holds one master shape's points in the space it is
//! bent from, their cylinder coordinates, and the normals with the point
//! each one belongs to. Bending is read-only on the instance: output goes
//! to buffers owned by the caller, one slice per motion key.

use std::sync::Arc;

use strix_math::{rotate_about, Mat4, Mat4Ext, Vec3, EPSILON};

use crate::cylinder::BoundingCylinder;
use crate::error::{ExportError, ExportResult, StrandError};
use crate::mesh::MasterShape;
use crate::nesting::walk_hierarchy;
use crate::output::KeyedBuffer;
use crate::provider::{MasterShapeProvider, ObjectId, ObjectKind};
use crate::strand::Strand;

#[derive(Debug, Clone)]
pub struct StrandInstance {
    shape: Arc<MasterShape>,
    local_transform: Mat4,
    points: Vec<Vec3>,
    normals: Vec<Vec3>,
    /// Point index each normal belongs to
    point_at_normals: Vec<u32>,
    cylinder: BoundingCylinder,
}

impl StrandInstance {
    /// Copy the master's points into instance space through `local_transform`
    /// and pair every normal with its point.
    ///
    /// Face-varying normals are resolved through the normal index list; a
    /// normal referenced several times keeps the last point it appears with.
    pub fn new(shape: Arc<MasterShape>, local_transform: Mat4) -> Self {
        let mesh = &shape.mesh;
        let points = mesh
            .positions
            .iter()
            .map(|p| local_transform.transform_point3(*p))
            .collect();

        let mut normals = Vec::new();
        let mut point_at_normals = Vec::new();
        if mesh.has_normals() {
            normals = vec![Vec3::ZERO; mesh.normals.len()];
            point_at_normals = vec![0; mesh.normals.len()];
            for (&nidx, &vidx) in mesh.normal_indices.iter().zip(&mesh.vertex_indices) {
                let (Some(n), Some(slot)) = (
                    mesh.normals.get(nidx as usize),
                    normals.get_mut(nidx as usize),
                ) else {
                    continue;
                };
                if vidx as usize >= mesh.positions.len() {
                    continue;
                }
                *slot = local_transform.transform_normal3(*n).normalize_or_zero();
                point_at_normals[nidx as usize] = vidx;
            }
        }

        Self {
            shape,
            local_transform,
            points,
            normals,
            point_at_normals,
            cylinder: BoundingCylinder::new(),
        }
    }

    pub fn shape(&self) -> &MasterShape {
        &self.shape
    }

    pub fn local_transform(&self) -> Mat4 {
        self.local_transform
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn cylinder(&self) -> &BoundingCylinder {
        &self.cylinder
    }

    /// Fit this instance's cylinder to its own points.
    pub fn compute_bounding_cylinder(&mut self) {
        for p in &self.points {
            self.cylinder.adjust(*p);
        }
    }

    /// One cylinder around the points of all `instances`.
    pub fn compute_model_bounding_cylinder(instances: &[StrandInstance]) -> BoundingCylinder {
        let mut cylinder = BoundingCylinder::new();
        for p in instances.iter().flat_map(|i| &i.points) {
            cylinder.adjust(*p);
        }
        cylinder
    }

    /// Use the extent of a cylinder shared with other shapes.
    pub fn share_cylinder(&mut self, cylinder: &BoundingCylinder) {
        self.cylinder.copy_boundaries(cylinder);
    }

    pub fn remap_points_to_cylinder(&mut self) -> Result<(), StrandError> {
        self.cylinder.allocate(self.points.len());
        for (i, p) in self.points.iter().enumerate() {
            self.cylinder.remap_point(*p, i)?;
        }
        Ok(())
    }

    /// Bend the remapped points and the normals onto `strand`.
    ///
    /// The output slices must match the instance's point and normal counts.
    pub fn bend_on_strand(
        &self,
        strand: &Strand,
        out_points: &mut [Vec3],
        out_normals: &mut [Vec3],
    ) -> Result<(), StrandError> {
        check_len("bent point", out_points.len(), self.points.len())?;
        check_len("bent normal", out_normals.len(), self.normals.len())?;
        let mapped = self.cylinder.remapped_points();
        check_len("cylinder point", mapped.len(), self.points.len())?;

        // Flat masters would stretch without bound
        let base_stretch = if self.cylinder.height > EPSILON {
            strand.length() / self.cylinder.height
        } else {
            1.0
        };

        for (out, m) in out_points.iter_mut().zip(mapped) {
            let frame = BendFrame::at(strand, m.height);
            let x = rotate_about(frame.x, frame.y, m.angle);
            let stretch = match strand.radius_by_t(m.height) {
                Some(r) => base_stretch * r,
                None => base_stretch,
            };
            *out = frame.position + x * (m.radius * stretch);
        }

        for ((out, n), &point) in out_normals
            .iter_mut()
            .zip(&self.normals)
            .zip(&self.point_at_normals)
        {
            let height = self
                .cylinder
                .remapped_point(point as usize)
                .map_or(0.0, |m| m.height);
            let frame = BendFrame::at(strand, height);
            let z = frame.x.cross(frame.y).normalize_or_zero();
            *out = (frame.x * n.x + frame.y * n.y + z * n.z).normalize_or_zero();
        }

        Ok(())
    }

    /// Bend onto `strand` into deform key `key` of `out`.
    pub fn bend_key(&self, strand: &Strand, key: usize, out: &mut BentShape) -> Result<(), StrandError> {
        let keys = out.points.keys();
        let points = out
            .points
            .key_slice_mut(key)
            .ok_or(StrandError::KeyOutOfRange { key, keys })?;
        let normals = out
            .normals
            .key_slice_mut(key)
            .ok_or(StrandError::KeyOutOfRange { key, keys })?;
        self.bend_on_strand(strand, points, normals)
    }
}

fn check_len(what: &'static str, len: usize, expected: usize) -> Result<(), StrandError> {
    if len == expected {
        Ok(())
    } else {
        Err(StrandError::IndexOutOfRange {
            what,
            index: expected.saturating_sub(1),
            len,
        })
    }
}

/// Strand position and sideways/tangent axes at one height.
struct BendFrame {
    position: Vec3,
    x: Vec3,
    y: Vec3,
}

impl BendFrame {
    fn at(strand: &Strand, t: f32) -> Self {
        let (position, index) = strand.position_by_t(t);
        let y = strand
            .segment_direction(index)
            .and_then(|d| d.try_normalize())
            .unwrap_or(Vec3::Y);
        let x = strand.bended_x_direction_by_t(position, y, t);
        Self { position, x, y }
    }
}

/// Bent points and normals of one instance on one strand, for every key.
#[derive(Debug, Clone, PartialEq)]
pub struct BentShape {
    pub points: KeyedBuffer<Vec3>,
    pub normals: KeyedBuffer<Vec3>,
}

impl BentShape {
    pub fn for_instance(instance: &StrandInstance, keys: usize) -> Self {
        Self {
            points: KeyedBuffer::new(instance.points.len(), keys),
            normals: KeyedBuffer::new(instance.normals.len(), keys),
        }
    }
}

/// A light or procedural under a master, re-emitted as a copy at each
/// strand root.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMember {
    pub id: ObjectId,
    pub name: String,
    /// Relative to the master
    pub transform: Mat4,
}

/// Everything a master contributes, ready to bend.
#[derive(Debug, Clone)]
pub struct MasterInstances {
    pub member: ObjectId,
    pub instances: Vec<StrandInstance>,
    pub duplicates: Vec<DuplicateMember>,
}

impl MasterInstances {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.duplicates.is_empty()
    }
}

/// True when `member` and everything under it can be bent from a shared
/// template.
pub fn is_cacheable_master<P>(provider: &P, member: ObjectId, time: f64, max_depth: usize) -> bool
where
    P: MasterShapeProvider + ?Sized,
{
    match walk_hierarchy(provider, member, time, max_depth) {
        Ok(visits) => visits
            .iter()
            .all(|v| provider.kind(v.id).map_or(true, ObjectKind::is_cacheable)),
        // The resolve reports the error
        Err(_) => true,
    }
}

/// Evaluate `member` at `time` and prepare its shapes.
///
/// Models and objects with children contribute every shape below them,
/// placed relative to the member and sharing one bounding cylinder. A plain
/// object only keeps its scale.
pub fn resolve_master<P>(
    provider: &P,
    member: ObjectId,
    time: f64,
    max_depth: usize,
) -> ExportResult<MasterInstances>
where
    P: MasterShapeProvider + ?Sized,
{
    let kind = provider
        .kind(member)
        .ok_or(ExportError::UnknownObject(member))?;
    let nested = kind == ObjectKind::Model || !provider.children(member, time).is_empty();

    let placements: Vec<(ObjectId, Mat4)> = if nested {
        walk_hierarchy(provider, member, time, max_depth)?
            .into_iter()
            .map(|v| (v.id, v.transform))
            .collect()
    } else {
        vec![(member, provider.local_transform(member, time).scale_only())]
    };

    let mut instances = Vec::new();
    let mut duplicates = Vec::new();
    for (id, transform) in placements {
        match provider.kind(id) {
            Some(k) if !k.is_cacheable() => duplicates.push(DuplicateMember {
                id,
                name: provider.name(id).unwrap_or_default().to_string(),
                transform,
            }),
            Some(ObjectKind::Model) | Some(ObjectKind::Null) | None => {}
            Some(_) => match provider.shape(id, time) {
                Some(shape) if !shape.mesh.positions.is_empty() => {
                    instances.push(StrandInstance::new(Arc::new(shape), transform));
                }
                _ => log::warn!("Skipping master {}: no geometry at time {}", id, time),
            },
        }
    }

    match instances.len() {
        0 => {}
        1 => instances[0].compute_bounding_cylinder(),
        _ => {
            let shared = StrandInstance::compute_model_bounding_cylinder(&instances);
            for instance in instances.iter_mut() {
                instance.share_cylinder(&shared);
            }
        }
    }
    for instance in instances.iter_mut() {
        instance.remap_points_to_cylinder()?;
        log::debug!(
            "Master {} shape {}: {} points, cylinder height {:.4} radius {:.4}",
            member,
            instance.shape.name,
            instance.points.len(),
            instance.cylinder.height,
            instance.cylinder.radius
        );
    }

    Ok(MasterInstances {
        member,
        instances,
        duplicates,
    })
}
