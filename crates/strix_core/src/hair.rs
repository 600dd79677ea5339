//! Building strands from a hair object's sample.

use serde::{Deserialize, Serialize};
use strix_math::Vec3;

use crate::assign::{Assignment, AssignmentMode};
use crate::error::StrandError;
use crate::provider::{ObjectId, StrandSample};
use crate::strand::Strand;

/// How instanced masters are rotated around their strand.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum OrientationMode {
    #[default]
    None,
    /// Per-strand direction from a tangent map, rotated by `spread` degrees
    TangentMap {
        map: String,
        #[serde(default)]
        spread: f32,
    },
}

/// Instancing settings of a hair object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancingSettings {
    /// Group members the strands choose from
    pub masters: Vec<ObjectId>,
    pub assignment: AssignmentMode,
    pub orientation: OrientationMode,
}

/// Instancing settings resolved against what a sample actually provides.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub assignment: Assignment,
    pub weight_map: Option<String>,
    pub tangent_map: Option<String>,
    /// Radians
    pub spread: f32,
}

impl InstancingSettings {
    /// Fall back to random assignment / no orientation when a named map is
    /// missing from `sample`.
    pub fn resolve(&self, sample: &StrandSample, object: &str) -> ResolvedSettings {
        let (assignment, weight_map) = match &self.assignment {
            AssignmentMode::Random => (Assignment::Random, None),
            AssignmentMode::PerStrand => {
                if sample.master_indices.is_empty() {
                    log::warn!(
                        "{}: no per-strand master indices, assigning at random",
                        object
                    );
                    (Assignment::Random, None)
                } else {
                    (Assignment::PerStrand, None)
                }
            }
            AssignmentMode::WeightMap { map, fuzziness } => {
                if sample.weight_maps.contains_key(map) {
                    (
                        Assignment::WeightMap {
                            fuzziness: (fuzziness / 100.0).max(0.0),
                        },
                        Some(map.clone()),
                    )
                } else {
                    log::warn!(
                        "{}: weight map '{}' not found, assigning at random",
                        object,
                        map
                    );
                    (Assignment::Random, None)
                }
            }
        };

        let (tangent_map, spread) = match &self.orientation {
            OrientationMode::None => (None, 0.0),
            OrientationMode::TangentMap { map, spread } => {
                if sample.tangent_maps.contains_key(map) {
                    (Some(map.clone()), spread.to_radians())
                } else {
                    log::warn!(
                        "{}: tangent map '{}' not found, ignoring orientation",
                        object,
                        map
                    );
                    (None, 0.0)
                }
            }
        };

        ResolvedSettings {
            assignment,
            weight_map,
            tangent_map,
            spread,
        }
    }
}

/// Options for turning a sample into strands.
#[derive(Debug, Clone, Default)]
pub struct HairBuildOptions {
    pub weight_map: Option<String>,
    pub tangent_map: Option<String>,
    /// Radians
    pub spread: f32,
    /// Number of exact motion blur keys to allocate (0 for none)
    pub exact_keys: usize,
}

impl From<&ResolvedSettings> for HairBuildOptions {
    fn from(settings: &ResolvedSettings) -> Self {
        Self {
            weight_map: settings.weight_map.clone(),
            tangent_map: settings.tangent_map.clone(),
            spread: settings.spread,
            exact_keys: 0,
        }
    }
}

/// The strands of one hair object at one time.
#[derive(Debug, Clone, Default)]
pub struct Hair {
    strands: Vec<Strand>,
    vertex_counts: Vec<u32>,
}

impl Hair {
    /// Build strands from `sample`.
    ///
    /// Mismatched channel sizes are padded or truncated. A strand with no
    /// vertices fails the whole build; a single vertex gives a degenerate
    /// two-point strand.
    pub fn build(
        sample: &StrandSample,
        options: &HairBuildOptions,
        object: &str,
    ) -> Result<Hair, StrandError> {
        let mut sample = sample.clone();
        sample.conform(object);

        let weights = options
            .weight_map
            .as_ref()
            .and_then(|name| sample.weight_maps.get(name));
        let tangents = options
            .tangent_map
            .as_ref()
            .and_then(|name| sample.tangent_maps.get(name));

        let mut strands = Vec::with_capacity(sample.strand_count());
        let mut offset = 0;
        for (i, &count) in sample.vertex_counts.iter().enumerate() {
            let count = count as usize;
            if count == 0 {
                return Err(StrandError::EmptyStrand { strand: i });
            }

            let mut strand = allocate_strand(&sample, count, options.exact_keys);
            fill_strand(&mut strand, &sample, offset, count, None)?;

            if let Some(w) = weights.and_then(|w| w.get(i)) {
                strand.set_weight_map_value(*w);
            }
            if let Some([r, g, b, _]) = tangents.and_then(|t| t.get(i)) {
                strand.set_tangent_map_rgb(*r, *g, *b);
            }

            strand.compute_length();
            strand.compute_bended_x(tangents.is_some(), options.spread);
            strands.push(strand);
            offset += count;
        }

        log::debug!("{}: built {} strands", object, strands.len());
        Ok(Hair {
            strands,
            vertex_counts: sample.vertex_counts,
        })
    }

    /// Store the geometry of deform key `key` for exact motion blur.
    ///
    /// The sample must have the same vertex counts as the one the hair was
    /// built from.
    pub fn set_key_sample(
        &mut self,
        key: usize,
        sample: &StrandSample,
        object: &str,
    ) -> Result<(), StrandError> {
        let mut sample = sample.clone();
        sample.conform(object);

        let mut offset = 0;
        for (strand, &count) in self.strands.iter_mut().zip(&sample.vertex_counts) {
            let count = count as usize;
            fill_strand(strand, &sample, offset, count, Some(key))?;
            offset += count;
        }
        Ok(())
    }

    pub fn strands(&self) -> &[Strand] {
        &self.strands
    }

    pub fn strand_count(&self) -> usize {
        self.strands.len()
    }

    pub fn vertex_counts(&self) -> &[u32] {
        &self.vertex_counts
    }
}

fn allocate_strand(sample: &StrandSample, count: usize, exact_keys: usize) -> Strand {
    let per_vertex = |present: bool| if present { count.max(2) } else { 0 };
    Strand::new(
        count,
        per_vertex(!sample.radii.is_empty()),
        per_vertex(!sample.velocities.is_empty()),
        per_vertex(!sample.orientations.is_empty()),
        exact_keys > 0,
        exact_keys,
    )
}

/// Copy one strand's vertices out of the flat sample channels, into the
/// reference arrays or into motion key `key`. The last vertex is repeated
/// to fill a clamped two-point strand.
fn fill_strand(
    strand: &mut Strand,
    sample: &StrandSample,
    offset: usize,
    count: usize,
    key: Option<usize>,
) -> Result<(), StrandError> {
    for j in 0..strand.point_count() {
        let src = offset + j.min(count.saturating_sub(1));
        let p = sample.positions.get(src).copied().unwrap_or(Vec3::ZERO);
        match key {
            None => {
                strand.set_point(p, j)?;
                if let Some(r) = sample.radii.get(src) {
                    strand.set_radius(*r, j)?;
                }
                if let Some(v) = sample.velocities.get(src) {
                    strand.set_velocity(*v, j)?;
                }
                if let Some(q) = sample.orientations.get(src) {
                    strand.set_orientation(*q, j)?;
                }
            }
            Some(key) => {
                strand.set_mb_point(p, j, key)?;
                if let Some(r) = sample.radii.get(src).filter(|_| !strand.radii().is_empty()) {
                    strand.set_mb_radius(*r, j, key)?;
                }
                if let Some(q) = sample
                    .orientations
                    .get(src)
                    .filter(|_| !strand.orientations().is_empty())
                {
                    strand.set_mb_orientation(*q, j, key)?;
                }
            }
        }
    }
    Ok(())
}
