use std::path::Path;

use crate::context::EffectContext;
use crate::effects::Effect;
use crate::error::VdcrptResult;

/// Passes its input through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyEffect;

impl Effect for CopyEffect {
    fn kind(&self) -> &str {
        "copy"
    }

    fn apply(&mut self, _ctx: &EffectContext, input: &Path, output: &Path) -> VdcrptResult<()> {
        std::fs::copy(input, output)?;
        Ok(())
    }
}
