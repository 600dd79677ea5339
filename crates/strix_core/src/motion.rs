//! Deform motion blur sampling of hair objects.
//!
//! Exact blur re-evaluates the hair at every deform key. Velocity blur
//! evaluates it once and extrapolates each key from per-point velocities.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult, StrandError};
use crate::hair::{Hair, HairBuildOptions};
use crate::provider::{AttributeProvider, ObjectId, StrandSample};
use crate::strand::Strand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionBlurMode {
    Exact,
    Velocity,
}

/// True when every sample has the same strand layout.
pub fn point_counts_match(samples: &[StrandSample]) -> bool {
    match samples.split_first() {
        Some((first, rest)) => rest.iter().all(|s| s.vertex_counts == first.vertex_counts),
        None => true,
    }
}

/// Samples hair objects at the deform keys of one export pass.
#[derive(Debug, Clone)]
pub struct MotionBlurSampler {
    mode: MotionBlurMode,
    frame: f64,
    offsets: Vec<f64>,
    seconds_per_frame: f32,
}

impl MotionBlurSampler {
    pub fn from_config(config: &ExportConfig) -> Self {
        let mode = if config.motion_blur.exact {
            MotionBlurMode::Exact
        } else {
            MotionBlurMode::Velocity
        };
        Self {
            mode,
            frame: config.frame,
            offsets: config.motion_blur.deform_offsets(),
            seconds_per_frame: config.seconds_per_frame,
        }
    }

    pub fn mode(&self) -> MotionBlurMode {
        self.mode
    }

    pub fn key_count(&self) -> usize {
        self.offsets.len()
    }

    /// Fetch and build the strands of `id` for every deform key.
    ///
    /// Exact sampling falls back to velocity when the strand layout changes
    /// across the shutter.
    pub fn sample<P>(
        &self,
        provider: &P,
        id: ObjectId,
        name: &str,
        options: &HairBuildOptions,
    ) -> ExportResult<MotionSamples>
    where
        P: AttributeProvider + ?Sized,
    {
        let fetch = |time: f64| {
            provider
                .strand_sample(id, time)
                .ok_or(ExportError::MissingSample { object: id, time })
        };
        let reference_sample = fetch(self.frame)?;

        if self.mode == MotionBlurMode::Exact && self.offsets.len() > 1 {
            let key_samples = self
                .offsets
                .iter()
                .map(|offset| fetch(self.frame + offset))
                .collect::<ExportResult<Vec<_>>>()?;

            let mut all = Vec::with_capacity(key_samples.len() + 1);
            all.push(reference_sample.clone());
            all.extend(key_samples.iter().cloned());

            if point_counts_match(&all) {
                let options = HairBuildOptions {
                    exact_keys: key_samples.len(),
                    ..options.clone()
                };
                let mut reference = Hair::build(&reference_sample, &options, name)?;
                for (key, sample) in key_samples.iter().enumerate() {
                    reference.set_key_sample(key, sample, name)?;
                }
                return Ok(MotionSamples {
                    mode: MotionBlurMode::Exact,
                    reference,
                    offsets: self.offsets.clone(),
                    seconds_per_frame: self.seconds_per_frame,
                    downgraded: false,
                });
            }

            log::warn!(
                "{}: point count changes across the shutter, falling back to velocity motion blur",
                name
            );
            let reference = Hair::build(&reference_sample, options, name)?;
            return Ok(MotionSamples {
                mode: MotionBlurMode::Velocity,
                reference,
                offsets: self.offsets.clone(),
                seconds_per_frame: self.seconds_per_frame,
                downgraded: true,
            });
        }

        let reference = Hair::build(&reference_sample, options, name)?;
        Ok(MotionSamples {
            mode: MotionBlurMode::Velocity,
            reference,
            offsets: self.offsets.clone(),
            seconds_per_frame: self.seconds_per_frame,
            downgraded: false,
        })
    }
}

/// The hair of one object, able to produce its strands at any deform key.
#[derive(Debug, Clone)]
pub struct MotionSamples {
    pub mode: MotionBlurMode,
    /// Strands at the exported frame, with key geometry for exact blur
    pub reference: Hair,
    offsets: Vec<f64>,
    seconds_per_frame: f32,
    /// Exact blur was requested but could not be honored
    pub downgraded: bool,
}

impl MotionSamples {
    pub fn key_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn strand_count(&self) -> usize {
        self.reference.strand_count()
    }

    /// Strand `index` at deform key `key`.
    pub fn strand_at_key(&self, index: usize, key: usize) -> Result<Cow<'_, Strand>, StrandError> {
        let strands = self.reference.strands();
        let strand = strands.get(index).ok_or(StrandError::IndexOutOfRange {
            what: "strand",
            index,
            len: strands.len(),
        })?;
        let offset = *self.offsets.get(key).ok_or(StrandError::KeyOutOfRange {
            key,
            keys: self.offsets.len(),
        })?;

        match self.mode {
            MotionBlurMode::Exact => strand.at_key(key).map(Cow::Owned),
            MotionBlurMode::Velocity if offset == 0.0 || strand.velocities().is_empty() => {
                Ok(Cow::Borrowed(strand))
            }
            MotionBlurMode::Velocity => Ok(Cow::Owned(
                strand.displaced(self.seconds_per_frame * offset as f32),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use strix_math::Vec3;

    use crate::attribute::UserAttribute;
    use crate::hair::InstancingSettings;

    /// Hair whose single strand rises from x = time.
    struct MovingHair {
        counts_at: HashMap<i64, Vec<u32>>,
    }

    impl AttributeProvider for MovingHair {
        fn hair_objects(&self) -> Vec<ObjectId> {
            vec![ObjectId(1)]
        }

        fn strand_sample(&self, _id: ObjectId, time: f64) -> Option<StrandSample> {
            let counts = self
                .counts_at
                .get(&((time * 1000.0).round() as i64))
                .cloned()
                .unwrap_or_else(|| vec![2]);
            let total: u32 = counts.iter().sum();
            let x = time as f32;
            Some(StrandSample {
                positions: (0..total).map(|i| Vec3::new(x, i as f32, 0.0)).collect(),
                velocities: vec![Vec3::new(24.0, 0.0, 0.0); total as usize],
                vertex_counts: counts,
                ..Default::default()
            })
        }

        fn instancing(&self, _id: ObjectId) -> Option<InstancingSettings> {
            None
        }

        fn user_attributes(&self, _id: ObjectId) -> Vec<UserAttribute> {
            Vec::new()
        }
    }

    fn blurred_config(exact: bool) -> ExportConfig {
        let mut config = ExportConfig::default();
        config.frame = 1.0;
        config.motion_blur.enabled = true;
        config.motion_blur.exact = exact;
        config
    }

    #[test]
    fn test_point_counts_match() {
        let a = StrandSample {
            vertex_counts: vec![2, 3],
            ..Default::default()
        };
        let mut b = a.clone();
        assert!(point_counts_match(&[a.clone(), b.clone()]));
        b.vertex_counts = vec![3, 2];
        assert!(!point_counts_match(&[a, b]));
        assert!(point_counts_match(&[]));
    }

    #[test]
    fn test_exact_samples_each_key() {
        let provider = MovingHair {
            counts_at: HashMap::new(),
        };
        let sampler = MotionBlurSampler::from_config(&blurred_config(true));
        let samples = sampler
            .sample(&provider, ObjectId(1), "hair", &HairBuildOptions::default())
            .unwrap();

        assert_eq!(samples.mode, MotionBlurMode::Exact);
        assert!(!samples.downgraded);
        assert_eq!(samples.key_count(), 2);

        let first = samples.strand_at_key(0, 0).unwrap();
        let last = samples.strand_at_key(0, 1).unwrap();
        assert!((first.points()[0].x - 0.75).abs() < 1e-6);
        assert!((last.points()[0].x - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_extrapolates() {
        let provider = MovingHair {
            counts_at: HashMap::new(),
        };
        let sampler = MotionBlurSampler::from_config(&blurred_config(false));
        let samples = sampler
            .sample(&provider, ObjectId(1), "hair", &HairBuildOptions::default())
            .unwrap();

        assert_eq!(samples.mode, MotionBlurMode::Velocity);
        // 24 units/s over a quarter frame at 24 fps
        let first = samples.strand_at_key(0, 0).unwrap();
        let last = samples.strand_at_key(0, 1).unwrap();
        assert!((first.points()[0].x - 0.75).abs() < 1e-5, "{}", first.points()[0].x);
        assert!((last.points()[0].x - 1.25).abs() < 1e-5, "{}", last.points()[0].x);
    }

    #[test]
    fn test_exact_downgrades_on_topology_change() {
        let provider = MovingHair {
            counts_at: HashMap::from([(1250, vec![3])]),
        };
        let sampler = MotionBlurSampler::from_config(&blurred_config(true));
        let samples = sampler
            .sample(&provider, ObjectId(1), "hair", &HairBuildOptions::default())
            .unwrap();

        assert_eq!(samples.mode, MotionBlurMode::Velocity);
        assert!(samples.downgraded);
        assert_eq!(samples.strand_count(), 1);
    }

    #[test]
    fn test_no_blur_borrows_reference() {
        let provider = MovingHair {
            counts_at: HashMap::new(),
        };
        let sampler = MotionBlurSampler::from_config(&ExportConfig::default());
        assert_eq!(sampler.key_count(), 1);
        let samples = sampler
            .sample(&provider, ObjectId(1), "hair", &HairBuildOptions::default())
            .unwrap();
        assert!(matches!(
            samples.strand_at_key(0, 0).unwrap(),
            Cow::Borrowed(_)
        ));
        assert!(samples.strand_at_key(0, 1).is_err());
        assert!(samples.strand_at_key(1, 0).is_err());
    }
}
