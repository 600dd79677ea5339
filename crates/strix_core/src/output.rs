//! Output contract towards the renderer's node layer.
//!
//! Geometry leaves the core as count-prefixed flat float arrays, keyed by
//! deform sample, plus one matrix per transform sample.

use std::fmt;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use strix_math::{Mat4, Vec3};
use thiserror::Error;

use crate::attribute::UserAttribute;
use crate::provider::ObjectId;

/// `count` elements per key, key-major.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedBuffer<T> {
    count: usize,
    keys: usize,
    data: Vec<T>,
}

impl<T: Pod> KeyedBuffer<T> {
    pub fn new(count: usize, keys: usize) -> Self {
        Self {
            count,
            keys,
            data: vec![T::zeroed(); count * keys],
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn keys(&self) -> usize {
        self.keys
    }

    pub fn key_slice(&self, key: usize) -> Option<&[T]> {
        if key >= self.keys {
            return None;
        }
        self.data.get(key * self.count..(key + 1) * self.count)
    }

    /// The slice of key `key`; writes never reach another key.
    pub fn key_slice_mut(&mut self, key: usize) -> Option<&mut [T]> {
        if key >= self.keys {
            return None;
        }
        self.data.get_mut(key * self.count..(key + 1) * self.count)
    }

    /// Per-key slices, for filling keys independently.
    pub fn key_slices_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
        // chunks_mut panics on 0
        self.data.chunks_mut(self.count.max(1))
    }

    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn to_flat(&self) -> FlatArray {
        FlatArray {
            count: self.count,
            keys: self.keys,
            data: self.as_floats().to_vec(),
        }
    }
}

/// A flat float array with its element count and key count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatArray {
    pub count: usize,
    pub keys: usize,
    pub data: Vec<f32>,
}

/// Points of a curve in catmull-rom layout: the first and last points
/// repeated so the spline reaches both ends.
pub fn catmull_rom_points(points: &[Vec3]) -> Vec<Vec3> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(points.len() + 2);
    out.push(*first);
    out.extend_from_slice(points);
    out.push(*last);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveBasis {
    #[default]
    CatmullRom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGeometry {
    pub basis: CurveBasis,
    /// Points per curve, end duplicates included
    pub num_points: Vec<u32>,
    pub points: FlatArray,
    /// One radius per original point
    pub radius: Vec<f32>,
    pub min_pixel_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeGeometry {
    Polymesh {
        points: FlatArray,
        normals: Option<FlatArray>,
        vertex_indices: Vec<u32>,
        normal_indices: Vec<u32>,
    },
    Curves(CurveGeometry),
    /// Copy of a scene object that cannot be rebuilt from bent geometry
    Duplicate { source: ObjectId },
}

/// Everything needed to create one renderer node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    /// Object the geometry comes from
    pub id: ObjectId,
    pub geometry: NodeGeometry,
    /// One per transform key
    pub matrices: Vec<Mat4>,
    #[serde(default)]
    pub user_data: Vec<UserAttribute>,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("node '{name}' rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("unknown node handle {0}")]
    UnknownHandle(usize),
}

/// The node-creation layer.
pub trait NodeSink {
    type Handle: Copy + fmt::Debug;

    fn create_node(&mut self, desc: NodeDesc) -> Result<Self::Handle, SinkError>;

    fn destroy_node(&mut self, handle: Self::Handle) -> Result<(), SinkError>;

    /// Group the nodes of one exported object.
    fn push_group(&mut self, object: ObjectId, handles: &[Self::Handle]) -> Result<(), SinkError>;
}

/// Nodes created for one object, destroyed on drop unless committed.
pub struct NodeBatch<'a, S: NodeSink> {
    sink: &'a mut S,
    handles: Vec<S::Handle>,
    committed: bool,
}

impl<'a, S: NodeSink> NodeBatch<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            handles: Vec::new(),
            committed: false,
        }
    }

    pub fn create(&mut self, desc: NodeDesc) -> Result<S::Handle, SinkError> {
        let handle = self.sink.create_node(desc)?;
        self.handles.push(handle);
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Push the nodes as the group of `object` and keep them.
    pub fn commit(mut self, object: ObjectId) -> Result<usize, SinkError> {
        self.sink.push_group(object, &self.handles)?;
        self.committed = true;
        Ok(self.handles.len())
    }
}

impl<S: NodeSink> Drop for NodeBatch<'_, S> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for handle in self.handles.drain(..) {
            if let Err(e) = self.sink.destroy_node(handle) {
                log::warn!("Failed to destroy node {:?}: {}", handle, e);
            }
        }
    }
}

/// In-memory sink, used by the command line tool and in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    nodes: Vec<Option<NodeDesc>>,
    groups: Vec<(ObjectId, Vec<usize>)>,
    destroyed: usize,
    /// Reject every node after this many were created
    pub fail_after: Option<usize>,
}

/// Serializable view of what a [`RecordingSink`] holds.
#[derive(Debug, Serialize)]
pub struct RecordedGroup<'a> {
    pub object: ObjectId,
    pub nodes: Vec<&'a NodeDesc>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes that were created and not destroyed.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDesc> {
        self.nodes.iter().flatten()
    }

    pub fn live_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    pub fn node(&self, name: &str) -> Option<&NodeDesc> {
        self.nodes().find(|n| n.name == name)
    }

    pub fn groups(&self) -> Vec<RecordedGroup<'_>> {
        self.groups
            .iter()
            .map(|(object, handles)| RecordedGroup {
                object: *object,
                nodes: handles
                    .iter()
                    .filter_map(|&h| self.nodes.get(h).and_then(Option::as_ref))
                    .collect(),
            })
            .collect()
    }
}

impl NodeSink for RecordingSink {
    type Handle = usize;

    fn create_node(&mut self, desc: NodeDesc) -> Result<usize, SinkError> {
        if self.fail_after.is_some_and(|limit| self.nodes.len() >= limit) {
            return Err(SinkError::Rejected {
                name: desc.name,
                reason: "node limit reached".into(),
            });
        }
        self.nodes.push(Some(desc));
        Ok(self.nodes.len() - 1)
    }

    fn destroy_node(&mut self, handle: usize) -> Result<(), SinkError> {
        match self.nodes.get_mut(handle).and_then(Option::take) {
            Some(_) => {
                self.destroyed += 1;
                Ok(())
            }
            None => Err(SinkError::UnknownHandle(handle)),
        }
    }

    fn push_group(&mut self, object: ObjectId, handles: &[usize]) -> Result<(), SinkError> {
        if let Some(&bad) = handles
            .iter()
            .find(|&&h| !matches!(self.nodes.get(h), Some(Some(_))))
        {
            return Err(SinkError::UnknownHandle(bad));
        }
        self.groups.push((object, handles.to_vec()));
        Ok(())
    }
}
