//! Export pass configuration.
//!
//! Every field has a default so partial JSON documents deserialize.

use serde::{Deserialize, Serialize};

/// Which transform key the master shapes are evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterPosition {
    #[default]
    Start,
    Center,
    End,
}

/// Motion blur sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBlurConfig {
    /// Master switch. When off, one deform and one transform key at the frame.
    pub enabled: bool,

    /// Re-evaluate geometry at each deform key instead of extrapolating by velocity
    pub exact: bool,

    /// Deform key offsets, in frames, relative to the exported frame
    pub deform_keys: Vec<f64>,

    /// Transform key offsets, in frames, relative to the exported frame
    pub transform_keys: Vec<f64>,

    /// Transform key used to evaluate instanced masters
    pub shutter_position: ShutterPosition,
}

impl Default for MotionBlurConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            exact: true,
            deform_keys: vec![-0.25, 0.25],
            transform_keys: vec![-0.25, 0.25],
            shutter_position: ShutterPosition::Start,
        }
    }
}

impl MotionBlurConfig {
    /// Deform key offsets actually sampled.
    pub fn deform_offsets(&self) -> Vec<f64> {
        Self::offsets(self.enabled, &self.deform_keys)
    }

    /// Transform key offsets actually sampled.
    pub fn transform_offsets(&self) -> Vec<f64> {
        Self::offsets(self.enabled, &self.transform_keys)
    }

    fn offsets(enabled: bool, keys: &[f64]) -> Vec<f64> {
        if !enabled || keys.is_empty() {
            vec![0.0]
        } else {
            keys.to_vec()
        }
    }
}

/// Source of the jitter applied to weight-map assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterSource {
    /// The 16807 linear congruential generator, bit-compatible with older exports
    #[default]
    Legacy,
    /// `StdRng` seeded from `seed`
    Seeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub source: JitterSource,
    pub seed: u64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            source: JitterSource::Legacy,
            seed: 666,
        }
    }
}

/// Settings for one export pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Frame being exported
    pub frame: f64,

    /// Duration of one frame, used to scale velocities
    pub seconds_per_frame: f32,

    pub motion_blur: MotionBlurConfig,

    pub jitter: JitterConfig,

    /// Maximum model/instance nesting before a walk gives up
    pub max_nesting_depth: usize,

    /// Bend strands across the rayon thread pool
    pub parallel: bool,

    /// Maximum number of curves per exported curves node
    pub chunk_size: usize,

    /// Minimum pixel width stamped on exported curves
    pub min_pixel_width: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            frame: 1.0,
            seconds_per_frame: 1.0 / 24.0,
            motion_blur: MotionBlurConfig::default(),
            jitter: JitterConfig::default(),
            max_nesting_depth: 16,
            parallel: true,
            chunk_size: 300_000,
            min_pixel_width: 0.25,
        }
    }
}

impl ExportConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Absolute times of the transform keys.
    pub fn transform_times(&self) -> Vec<f64> {
        self.motion_blur
            .transform_offsets()
            .into_iter()
            .map(|offset| self.frame + offset)
            .collect()
    }

    /// Time at which instanced masters are evaluated.
    ///
    /// Masters are sampled once; the instances only pick up the motion of the
    /// strands they are bent on.
    pub fn master_time(&self) -> f64 {
        let keys = self.transform_times();
        if self.motion_blur.deform_offsets().len() < 2 {
            return self.frame;
        }
        let (first, last) = match (keys.first(), keys.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.frame,
        };
        match self.motion_blur.shutter_position {
            ShutterPosition::Start => first,
            ShutterPosition::Center => (first + last) * 0.5,
            ShutterPosition::End => last,
        }
    }
}
