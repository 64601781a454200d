use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{VdcrptError, VdcrptResult};

/// Output settings for one transcode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Forced container format (`-f`); inferred from the output name when unset.
    pub format: Option<String>,
    pub strip_metadata: bool,
    /// Regenerate missing presentation timestamps (`-fflags +genpts`).
    pub gen_pts: bool,
    /// Extra output arguments, passed through verbatim.
    pub extra_args: Vec<String>,
    pub overwrite: bool,
}

impl TranscodeOptions {
    /// Conversion into a working format with the given codecs.
    pub fn convert(
        video_codec: impl Into<String>,
        audio_codec: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            video_codec: Some(video_codec.into()),
            audio_codec: Some(audio_codec.into()),
            format: Some(format.into()),
            strip_metadata: false,
            gen_pts: false,
            extra_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Final render into a broadly playable file: no metadata, regenerated
    /// timestamps, H.264 + AAC.
    pub fn final_output() -> Self {
        Self {
            video_codec: Some("libx264".to_string()),
            audio_codec: Some("aac".to_string()),
            format: None,
            strip_metadata: true,
            gen_pts: true,
            extra_args: Vec::new(),
            overwrite: true,
        }
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self::final_output()
    }
}

/// Converts media files between codecs and containers.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path, opts: &TranscodeOptions)
    -> VdcrptResult<()>;
}

/// [`Transcoder`] backed by the system `ffmpeg` binary.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn args(input: &Path, output: &Path, opts: &TranscodeOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        args.push(if opts.overwrite { "-y" } else { "-n" }.into());
        args.extend(["-loglevel", "fatal"].map(OsString::from));
        if opts.gen_pts {
            args.extend(["-fflags", "+genpts"].map(OsString::from));
        }
        args.push("-i".into());
        args.push(input.into());

        if opts.strip_metadata {
            args.extend(["-map_metadata", "-1"].map(OsString::from));
        }
        if let Some(codec) = &opts.video_codec {
            args.push("-c:v".into());
            args.push(codec.into());
        }
        if let Some(codec) = &opts.audio_codec {
            args.push("-c:a".into());
            args.push(codec.into());
        }
        args.extend(opts.extra_args.iter().map(OsString::from));
        if let Some(format) = &opts.format {
            args.push("-f".into());
            args.push(format.into());
        }
        args.push(output.into());
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self, opts))]
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        opts: &TranscodeOptions,
    ) -> VdcrptResult<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let args = Self::args(input, output, opts);
        tracing::debug!(program = %self.program.display(), ?args, "spawning transcoder");

        let out = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                VdcrptError::transcode(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;

        if !out.status.success() {
            return Err(VdcrptError::transcode(format!(
                "'{}' exited with status {} for '{}': {}",
                self.program.display(),
                out.status,
                input.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}
