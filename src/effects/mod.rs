//! Effects turn one video file into another, usually by breaking its encoding
//! at the byte level.

pub mod binary_repeat;
pub mod burst;
pub mod copy;
pub mod frame_burst;

use std::path::Path;

use crate::context::EffectContext;
use crate::error::VdcrptResult;

pub use binary_repeat::BinaryRepeatEffect;
pub use burst::{BurstParams, burst_bytes};
pub use copy::CopyEffect;
pub use frame_burst::{FrameBurstEffect, FrameBurstParams};

/// A file-to-file transform run by a [`crate::Session`].
///
/// `apply` must leave a file at `output`. It may be called even when an
/// earlier run produced the same result; use the context's cache to skip
/// repeated work.
pub trait Effect {
    /// Effect type identifier, used to namespace cache and scratch directories.
    fn kind(&self) -> &str;

    fn apply(&mut self, ctx: &EffectContext, input: &Path, output: &Path) -> VdcrptResult<()>;
}
