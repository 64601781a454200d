use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::avi::AviFile;
use crate::context::EffectContext;
use crate::effects::Effect;
use crate::effects::burst::{BurstParams, burst_bytes};
use crate::error::{VdcrptError, VdcrptResult};
use crate::settings::CorruptionCodecs;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBurstParams {
    /// Burst applied inside each selected frame payload.
    pub burst: BurstParams,
    /// Chance that an eligible video frame is corrupted.
    pub frame_probability: f64,
    /// Leave key frames intact so the stream keeps decoding.
    pub skip_keyframes: bool,
}

impl Default for FrameBurstParams {
    fn default() -> Self {
        Self {
            burst: BurstParams {
                iterations: 1,
                burst_size: 64,
                min_repeat: 2,
                max_repeat: 6,
            },
            frame_probability: 0.25,
            skip_keyframes: true,
        }
    }
}

impl FrameBurstParams {
    pub fn validate(&self) -> VdcrptResult<()> {
        self.burst.validate()?;
        if !(0.0..=1.0).contains(&self.frame_probability) {
            return Err(VdcrptError::argument(format!(
                "frame_probability must be within [0, 1], got {}",
                self.frame_probability
            )));
        }
        Ok(())
    }
}

/// Byte bursts inside individual video frames.
///
/// Unlike [`crate::effects::BinaryRepeatEffect`] this keeps the container
/// valid: frames are rewritten through [`AviFile::for_each_frame`] and the
/// index is rebuilt, so players seek and count frames correctly while the
/// decoded picture smears.
#[derive(Clone, Debug)]
pub struct FrameBurstEffect {
    params: FrameBurstParams,
    codecs: CorruptionCodecs,
    rng: StdRng,
}

impl FrameBurstEffect {
    pub fn new(params: FrameBurstParams) -> VdcrptResult<Self> {
        Self::with_rng(params, StdRng::from_entropy())
    }

    pub fn with_seed(params: FrameBurstParams, seed: u64) -> VdcrptResult<Self> {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: FrameBurstParams, rng: StdRng) -> VdcrptResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            codecs: CorruptionCodecs::default(),
            rng,
        })
    }

    pub fn with_codecs(mut self, codecs: CorruptionCodecs) -> VdcrptResult<Self> {
        codecs.validate()?;
        self.codecs = codecs;
        Ok(self)
    }

    /// Corrupts the frames of an already parsed container in place and
    /// returns how many frames were touched.
    pub fn corrupt(&mut self, avi: &mut AviFile) -> VdcrptResult<usize> {
        let params = self.params;
        let rng = &mut self.rng;
        let mut touched = 0usize;

        avi.for_each_frame(|frame, data| {
            let eligible = frame.id.is_video()
                && !(params.skip_keyframes && frame.is_keyframe())
                && params.burst.fits(data.len());
            if !eligible || !rng.gen_bool(params.frame_probability) {
                return Ok(data);
            }
            touched += 1;
            burst_bytes(&data, &params.burst, &mut *rng)
        })?;

        Ok(touched)
    }
}

impl Effect for FrameBurstEffect {
    fn kind(&self) -> &str {
        "frame-burst"
    }

    #[tracing::instrument(skip(self, ctx))]
    fn apply(&mut self, ctx: &EffectContext, input: &Path, output: &Path) -> VdcrptResult<()> {
        let working = self.codecs.convert(ctx, input)?;
        let mut avi = AviFile::open(&working)?;
        let touched = self.corrupt(&mut avi)?;
        tracing::debug!(touched, frames = avi.frame_count(), "burst video frames");
        avi.save(output, true)
    }
}
