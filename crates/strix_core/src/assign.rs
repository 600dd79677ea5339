//! Choosing which master each strand receives.

use rand::rngs::StdRng;
use rand::{Error as RandError, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{JitterConfig, JitterSource};

/// How strands pick their master.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AssignmentMode {
    /// Strand index modulo master count
    #[default]
    Random,
    /// Per-strand weight scaled to the master count, with optional jitter
    WeightMap {
        map: String,
        /// Jitter amount in percent of one master slot
        #[serde(default)]
        fuzziness: f32,
    },
    /// Per-strand explicit master index from the sample
    PerStrand,
}

/// Multiplicative congruential generator (`seed *= 16807`).
///
/// Kept for bit-identical assignment with older exports.
#[derive(Debug, Clone)]
pub struct LegacyJitter {
    seed: u32,
}

impl LegacyJitter {
    pub const DEFAULT_SEED: u32 = 666;

    pub fn new(seed: u32) -> Self {
        Self { seed }
    }
}

impl Default for LegacyJitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

impl RngCore for LegacyJitter {
    fn next_u32(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(16807);
        self.seed
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Uniform float in `[-1, 1)` built from the top 23 bits of the next word.
pub fn sfrand(rng: &mut dyn RngCore) -> f32 {
    let bits = (rng.next_u32() >> 9) | 0x4000_0000;
    f32::from_bits(bits) - 3.0
}

/// Build the jitter generator described by `config`.
pub fn jitter_rng(config: &JitterConfig) -> Box<dyn RngCore + Send> {
    match config.source {
        JitterSource::Legacy => Box::new(LegacyJitter::new(config.seed as u32)),
        JitterSource::Seeded => Box::new(StdRng::seed_from_u64(config.seed)),
    }
}

/// Resolved per-object assignment policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    Random,
    /// Fuzziness as a fraction (`0..1`) of one master slot
    WeightMap { fuzziness: f32 },
    PerStrand,
}

impl Assignment {
    /// Master index for one strand.
    ///
    /// `weight` is the strand's clamped weight-map value and `explicit` its
    /// explicit index, each only read by the matching policy. The jitter
    /// generator is advanced once per weight-mapped strand when fuzziness is
    /// on, so results depend on strand order.
    pub fn select(
        &self,
        strand_index: usize,
        weight: f32,
        explicit: Option<u32>,
        master_count: usize,
        rng: &mut dyn RngCore,
    ) -> usize {
        if master_count == 0 {
            return 0;
        }
        let last = master_count - 1;

        match *self {
            Assignment::Random => strand_index % master_count,
            Assignment::WeightMap { fuzziness } => {
                let mut w = weight.clamp(0.0, 1.0);
                if fuzziness > 0.0 {
                    let r = sfrand(rng) * fuzziness;
                    w = (w + r / master_count as f32).clamp(0.0, 1.0);
                }
                ((w * master_count as f32) as usize).min(last)
            }
            Assignment::PerStrand => {
                let index = explicit.unwrap_or(0) as usize;
                if index > last {
                    log::warn!(
                        "Strand {} asks for master {} of {}, using the last one",
                        strand_index,
                        index,
                        master_count
                    );
                }
                index.min(last)
            }
        }
    }
}
