//! vdcrpt corrupts video files on purpose and renders the damage back into a
//! playable file.
//!
//! - [`avi`] reads an AVI container and rewrites its frame payloads.
//! - [`effects`] holds the corruption effects, starting from [`burst_bytes`].
//! - [`Session`] chains effects over an input file, caching intermediate
//!   conversions, and hands the result to a [`Transcoder`].
#![forbid(unsafe_code)]

pub mod avi;
pub mod cache;
pub mod context;
pub mod effects;
pub mod error;
pub mod session;
pub mod settings;
pub mod transcode;

pub use avi::{AviFile, FourCc, FrameRecord};
pub use context::{CachedFile, EffectContext};
pub use effects::{
    BinaryRepeatEffect, BurstParams, CopyEffect, Effect, FrameBurstEffect, FrameBurstParams,
    burst_bytes,
};
pub use error::{VdcrptError, VdcrptResult};
pub use session::{Session, SessionOpts, SessionState, clear_cache};
pub use settings::{CorruptionCodecs, EffectSettings};
pub use transcode::{FfmpegTranscoder, TranscodeOptions, Transcoder};
