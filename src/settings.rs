use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::EffectContext;
use crate::effects::{
    BinaryRepeatEffect, BurstParams, CopyEffect, Effect, FrameBurstEffect, FrameBurstParams,
};
use crate::error::{VdcrptError, VdcrptResult};

/// Codecs and container an input is converted to before corruption.
///
/// `mpeg4` + `pcm_mulaw` in AVI tolerate damaged bytes well: decoders keep
/// going and smear the picture instead of bailing out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionCodecs {
    pub video_codec: String,
    pub audio_codec: String,
    pub format: String,
}

impl Default for CorruptionCodecs {
    fn default() -> Self {
        Self {
            video_codec: "mpeg4".to_string(),
            audio_codec: "pcm_mulaw".to_string(),
            format: "avi".to_string(),
        }
    }
}

impl CorruptionCodecs {
    pub fn validate(&self) -> VdcrptResult<()> {
        for (name, value) in [
            ("video_codec", &self.video_codec),
            ("audio_codec", &self.audio_codec),
            ("format", &self.format),
        ] {
            if value.trim().is_empty() {
                return Err(VdcrptError::argument(format!("{name} must be non-empty")));
            }
        }
        Ok(())
    }

    pub(crate) fn convert(&self, ctx: &EffectContext, input: &Path) -> VdcrptResult<PathBuf> {
        ctx.convert_cached(input, &self.video_codec, &self.audio_codec, &self.format)
    }
}

/// Serializable description of one effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "kebab-case")]
pub enum EffectSettings {
    Copy,
    BinaryRepeat {
        #[serde(default)]
        burst: BurstParams,
        #[serde(default)]
        codecs: CorruptionCodecs,
        #[serde(default)]
        seed: Option<u64>,
    },
    FrameBurst {
        #[serde(default)]
        params: FrameBurstParams,
        #[serde(default)]
        codecs: CorruptionCodecs,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl EffectSettings {
    /// Reads a single effect object or an array of them.
    pub fn list_from_json_path(path: &Path) -> VdcrptResult<Vec<Self>> {
        let reader = BufReader::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(reader).map_err(|e| {
            VdcrptError::serde(format!("parse settings '{}': {e}", path.display()))
        })?;
        Self::list_from_value(value)
            .map_err(|e| VdcrptError::serde(format!("settings '{}': {e}", path.display())))
    }

    fn list_from_value(value: serde_json::Value) -> Result<Vec<Self>, serde_json::Error> {
        if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|one| vec![one])
        }
    }

    pub fn into_effect(self) -> VdcrptResult<Box<dyn Effect>> {
        Ok(match self {
            Self::Copy => Box::new(CopyEffect),
            Self::BinaryRepeat {
                burst,
                codecs,
                seed,
            } => {
                let effect = match seed {
                    Some(seed) => BinaryRepeatEffect::with_seed(burst, seed)?,
                    None => BinaryRepeatEffect::new(burst)?,
                };
                Box::new(effect.with_codecs(codecs)?)
            }
            Self::FrameBurst {
                params,
                codecs,
                seed,
            } => {
                let effect = match seed {
                    Some(seed) => FrameBurstEffect::with_seed(params, seed)?,
                    None => FrameBurstEffect::new(params)?,
                };
                Box::new(effect.with_codecs(codecs)?)
            }
        })
    }
}
