//! In-memory scene: objects, hierarchy, animated transforms and hair samples.
//!
//! This is the provider used by the command line tool and the tests. It is
//! loaded from JSON and answers both provider traits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strix_math::{Mat4, Quat, Vec3};
use thiserror::Error;

use crate::attribute::UserAttribute;
use crate::hair::InstancingSettings;
use crate::mesh::{MasterShape, Mesh};
use crate::provider::{AttributeProvider, MasterShapeProvider, ObjectId, ObjectKind, StrandSample};

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("invalid scene json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("object id {0} is used twice")]
    DuplicateId(ObjectId),

    #[error("object {object} has unknown parent {parent}")]
    UnknownParent { object: ObjectId, parent: ObjectId },
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Decompose a 4x4 matrix into translation, rotation and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn lerp(&self, other: &Transform, f: f32) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, f),
            rotation: self.rotation.slerp(other.rotation, f),
            scale: self.scale.lerp(other.scale, f),
        }
    }
}

/// A value at one time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyed<T> {
    pub time: f64,
    pub value: T,
}

/// Bracketing keys of `time` and the blend factor between them.
fn bracket<T>(keys: &[Keyed<T>], time: f64) -> Option<(&T, &T, f32)> {
    let first = keys.first()?;
    let last = keys.last()?;
    if time <= first.time {
        return Some((&first.value, &first.value, 0.0));
    }
    if time >= last.time {
        return Some((&last.value, &last.value, 0.0));
    }
    keys.windows(2).find_map(|w| {
        (time >= w[0].time && time <= w[1].time).then(|| {
            let span = w[1].time - w[0].time;
            let f = if span > 0.0 { (time - w[0].time) / span } else { 0.0 };
            (&w[0].value, &w[1].value, f as f32)
        })
    })
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    /// Transform relative to the parent
    #[serde(default)]
    pub transform: Transform,
    /// Time-keyed transforms, overriding `transform` when present
    #[serde(default)]
    pub animation: Vec<Keyed<Transform>>,
    #[serde(default)]
    pub mesh: Option<Mesh>,
    /// Time-keyed strand samples, for hair objects
    #[serde(default)]
    pub hair: Vec<Keyed<StrandSample>>,
    #[serde(default)]
    pub instancing: Option<InstancingSettings>,
    #[serde(default)]
    pub user_attributes: Vec<UserAttribute>,
}

impl SceneObject {
    pub fn new(id: u32, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: ObjectId(id),
            name: name.into(),
            kind,
            parent: None,
            transform: Transform::default(),
            animation: Vec::new(),
            mesh: None,
            hair: Vec::new(),
            instancing: None,
            user_attributes: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(ObjectId(parent));
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_key(mut self, time: f64, transform: Transform) -> Self {
        self.animation.push(Keyed {
            time,
            value: transform,
        });
        self.animation.sort_by(|a, b| a.time.total_cmp(&b.time));
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_hair(mut self, time: f64, sample: StrandSample) -> Self {
        self.hair.push(Keyed {
            time,
            value: sample,
        });
        self.hair.sort_by(|a, b| a.time.total_cmp(&b.time));
        self
    }

    pub fn with_instancing(mut self, settings: InstancingSettings) -> Self {
        self.instancing = Some(settings);
        self
    }

    pub fn with_attribute(mut self, attribute: UserAttribute) -> Self {
        self.user_attributes.push(attribute);
        self
    }

    /// Local transform at `time`.
    pub fn transform_at(&self, time: f64) -> Mat4 {
        match bracket(&self.animation, time) {
            Some((a, b, f)) => a.lerp(b, f).to_matrix(),
            None => self.transform.to_matrix(),
        }
    }

    /// Hair at `time`, blended between the bracketing samples when their
    /// strand layout matches, else the nearer one.
    pub fn hair_at(&self, time: f64) -> Option<StrandSample> {
        let (a, b, f) = bracket(&self.hair, time)?;
        if f == 0.0 {
            return Some(a.clone());
        }
        if a.vertex_counts != b.vertex_counts {
            return Some(if f < 0.5 { a.clone() } else { b.clone() });
        }
        Some(blend_samples(a, b, f))
    }
}

fn blend_samples(a: &StrandSample, b: &StrandSample, f: f32) -> StrandSample {
    let mut out = a.clone();
    for (p, q) in out.positions.iter_mut().zip(&b.positions) {
        *p = p.lerp(*q, f);
    }
    for (r, s) in out.radii.iter_mut().zip(&b.radii) {
        *r += (s - *r) * f;
    }
    for (v, w) in out.velocities.iter_mut().zip(&b.velocities) {
        *v = v.lerp(*w, f);
    }
    for (o, p) in out.orientations.iter_mut().zip(&b.orientations) {
        *o = o.slerp(*p, f);
    }
    out
}

/// A complete scene of objects.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    pub objects: Vec<SceneObject>,
    #[serde(skip)]
    index: HashMap<ObjectId, usize>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a scene.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let mut scene: Scene = serde_json::from_str(json)?;
        scene.rebuild_index()?;
        Ok(scene)
    }

    /// Add an object, replacing one with the same id.
    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id;
        match self.index.get(&id) {
            Some(&i) => self.objects[i] = object,
            None => {
                self.index.insert(id, self.objects.len());
                self.objects.push(object);
            }
        }
        id
    }

    fn rebuild_index(&mut self) -> Result<(), SceneError> {
        self.index.clear();
        for (i, object) in self.objects.iter().enumerate() {
            if self.index.insert(object.id, i).is_some() {
                return Err(SceneError::DuplicateId(object.id));
            }
        }
        for object in &self.objects {
            if let Some(parent) = object.parent {
                if !self.index.contains_key(&parent) {
                    return Err(SceneError::UnknownParent {
                        object: object.id,
                        parent,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.index.get(&id).and_then(|&i| self.objects.get(i))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl MasterShapeProvider for Scene {
    fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.object(id).map(|o| o.kind)
    }

    fn name(&self, id: ObjectId) -> Option<&str> {
        self.object(id).map(|o| o.name.as_str())
    }

    fn children(&self, id: ObjectId, time: f64) -> Vec<(ObjectId, Mat4)> {
        self.objects
            .iter()
            .filter(|o| o.parent == Some(id))
            .map(|o| (o.id, o.transform_at(time)))
            .collect()
    }

    fn local_transform(&self, id: ObjectId, time: f64) -> Mat4 {
        self.object(id)
            .map_or(Mat4::IDENTITY, |o| o.transform_at(time))
    }

    fn global_transform(&self, id: ObjectId, time: f64) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = self.object(id);
        // A parent loop cannot be longer than the object list
        for _ in 0..=self.objects.len() {
            let Some(object) = current else {
                break;
            };
            matrix = object.transform_at(time) * matrix;
            current = object.parent.and_then(|p| self.object(p));
        }
        matrix
    }

    fn shape(&self, id: ObjectId, time: f64) -> Option<MasterShape> {
        let object = self.object(id)?;
        let transform = self.global_transform(id, time);
        if object.kind == ObjectKind::Hair {
            let sample = object.hair_at(time)?;
            return Some(MasterShape::curves(
                id,
                object.name.clone(),
                &sample.positions,
                &sample.vertex_counts,
                sample.radii,
                transform,
            ));
        }
        let mesh = object.mesh.clone()?;
        Some(MasterShape::polymesh(id, object.name.clone(), mesh, transform))
    }
}

impl AttributeProvider for Scene {
    fn hair_objects(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|o| o.kind == ObjectKind::Hair)
            .map(|o| o.id)
            .collect()
    }

    fn strand_sample(&self, id: ObjectId, time: f64) -> Option<StrandSample> {
        self.object(id)?.hair_at(time)
    }

    fn instancing(&self, id: ObjectId) -> Option<InstancingSettings> {
        self.object(id)?.instancing.clone()
    }

    fn user_attributes(&self, id: ObjectId) -> Vec<UserAttribute> {
        self.object(id)
            .map(|o| o.user_attributes.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strand(x: f32) -> StrandSample {
        StrandSample {
            vertex_counts: vec![2],
            positions: vec![Vec3::new(x, 0.0, 0.0), Vec3::new(x, 1.0, 0.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_transform_matrix_roundtrip() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let recovered = Transform::from_matrix(transform.to_matrix());
        assert!((recovered.translation - transform.translation).length() < 0.001);
        assert!((recovered.scale - transform.scale).length() < 0.001);
    }

    #[test]
    fn test_hierarchy() {
        let mut scene = Scene::new("test");
        scene.add_object(
            SceneObject::new(1, "model", ObjectKind::Model)
                .with_transform(Transform::from_translation(Vec3::X)),
        );
        scene.add_object(
            SceneObject::new(2, "child", ObjectKind::Polymesh)
                .with_parent(1)
                .with_transform(Transform::from_translation(Vec3::Y)),
        );

        let children = scene.children(ObjectId(1), 1.0);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, ObjectId(2));

        let origin = scene
            .global_transform(ObjectId(2), 1.0)
            .transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_animated_transform() {
        let object = SceneObject::new(1, "a", ObjectKind::Null)
            .with_key(0.0, Transform::from_translation(Vec3::ZERO))
            .with_key(2.0, Transform::from_translation(Vec3::X * 2.0));
        let p = object.transform_at(1.5).transform_point3(Vec3::ZERO);
        assert!((p.x - 1.5).abs() < 1e-6);
        let p = object.transform_at(5.0).transform_point3(Vec3::ZERO);
        assert!((p.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_hair_blending() {
        let object = SceneObject::new(1, "hair", ObjectKind::Hair)
            .with_hair(1.0, strand(0.0))
            .with_hair(2.0, strand(1.0));
        let s = object.hair_at(1.25).unwrap();
        assert!((s.positions[0].x - 0.25).abs() < 1e-6);
        assert_eq!(object.hair_at(0.0).unwrap(), strand(0.0));
    }

    #[test]
    fn test_hair_topology_change_picks_nearest() {
        let mut dense = strand(1.0);
        dense.vertex_counts = vec![1, 1];
        let object = SceneObject::new(1, "hair", ObjectKind::Hair)
            .with_hair(1.0, strand(0.0))
            .with_hair(2.0, dense.clone());
        assert_eq!(object.hair_at(1.25).unwrap().vertex_counts, vec![2]);
        assert_eq!(object.hair_at(1.75).unwrap(), dense);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "name": "json",
            "objects": [
                {"id": 1, "name": "leaf", "kind": "polymesh",
                 "mesh": {"positions": [[0,0,0],[0,1,0]]}},
                {"id": 2, "name": "fur", "kind": "hair",
                 "hair": [{"time": 1.0, "value": {"vertex_counts": [2], "positions": [[0,0,0],[0,1,0]]}}],
                 "instancing": {"masters": [1], "assignment": {"mode": "random"}}}
            ]
        }"#;
        let scene = Scene::from_json(json).unwrap();
        assert_eq!(scene.object_count(), 2);
        assert_eq!(scene.hair_objects(), vec![ObjectId(2)]);
        assert_eq!(scene.instancing(ObjectId(2)).unwrap().masters, vec![ObjectId(1)]);
        assert!(scene.shape(ObjectId(1), 1.0).is_some());

        let curves = scene.shape(ObjectId(2), 1.0).unwrap();
        assert!(curves.is_curves());
    }

    #[test]
    fn test_from_json_rejects_bad_references() {
        let dup = r#"{"objects": [
            {"id": 1, "name": "a", "kind": "null"},
            {"id": 1, "name": "b", "kind": "null"}]}"#;
        assert!(matches!(Scene::from_json(dup), Err(SceneError::DuplicateId(_))));

        let orphan = r#"{"objects": [{"id": 1, "name": "a", "kind": "null", "parent": 7}]}"#;
        assert!(matches!(
            Scene::from_json(orphan),
            Err(SceneError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_parent_loop_terminates() {
        let mut scene = Scene::new("loop");
        scene.add_object(SceneObject::new(1, "a", ObjectKind::Null).with_parent(2));
        scene.add_object(SceneObject::new(2, "b", ObjectKind::Null).with_parent(1));
        let m = scene.global_transform(ObjectId(1), 1.0);
        assert_eq!(m, Mat4::IDENTITY);
    }
}
