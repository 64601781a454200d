use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::context::EffectContext;
use crate::effects::Effect;
use crate::effects::burst::{BurstParams, burst_bytes};
use crate::error::VdcrptResult;
use crate::settings::CorruptionCodecs;

/// Randomized bursts of repeated bytes across the whole file, like a
/// scratched CD.
///
/// The input is first converted to the working codecs (cached per input
/// content), then corrupted as one flat buffer.
#[derive(Clone, Debug)]
pub struct BinaryRepeatEffect {
    params: BurstParams,
    codecs: CorruptionCodecs,
    rng: StdRng,
}

impl BinaryRepeatEffect {
    pub fn new(params: BurstParams) -> VdcrptResult<Self> {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Same seed, same input, same output.
    pub fn with_seed(params: BurstParams, seed: u64) -> VdcrptResult<Self> {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: BurstParams, rng: StdRng) -> VdcrptResult<Self> {
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

    pub fn params(&self) -> &BurstParams {
        &self.params
    }
}

impl Effect for BinaryRepeatEffect {
    fn kind(&self) -> &str {
        "binary-repeat"
    }

    #[tracing::instrument(skip(self, ctx))]
    fn apply(&mut self, ctx: &EffectContext, input: &Path, output: &Path) -> VdcrptResult<()> {
        let working = self.codecs.convert(ctx, input)?;
        let data = fs::read(&working)?;
        let corrupted = burst_bytes(&data, &self.params, &mut self.rng)?;
        tracing::debug!(
            before = data.len(),
            after = corrupted.len(),
            "applied binary repeat"
        );
        fs::write(output, corrupted)?;
        Ok(())
    }
}
