use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{content_key, sanitize_file_name};
use crate::context::EffectContext;
use crate::effects::Effect;
use crate::error::{VdcrptError, VdcrptResult};
use crate::transcode::{FfmpegTranscoder, TranscodeOptions, Transcoder};

/// Where a session keeps its files and how it transcodes.
#[derive(Clone)]
pub struct SessionOpts {
    /// Parent of the shared `cache/` directory and per-session scratch
    /// directories.
    pub temp_root: PathBuf,
    pub transcoder: Arc<dyn Transcoder>,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("vdcrpt"),
            transcoder: Arc::new(FfmpegTranscoder::default()),
        }
    }
}

impl SessionOpts {
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Rendering,
    Completed,
    Failed,
}

/// Applies a chain of effects to one input file.
///
/// Effects only run on [`Session::render`]. Every effect writes to a
/// position-indexed file under the cache root (`render-0000`, `render-0001`,
/// ...), which the next effect reads. The cache root outlives the session;
/// the scratch root is removed when the session is dropped.
pub struct Session {
    input: PathBuf,
    cache_root: PathBuf,
    scratch_root: PathBuf,
    transcoder: Arc<dyn Transcoder>,
    effects: Vec<Box<dyn Effect>>,
    state: SessionState,
}

impl Session {
    pub fn new(input: impl Into<PathBuf>, opts: SessionOpts) -> VdcrptResult<Self> {
        let input = input.into();
        let input_key = content_key(&input)?;

        let cache_root = opts.temp_root.join("cache");
        let scratch_root = opts.temp_root.join(format!(
            "scratch-{input_key}-{}",
            uuid::Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&cache_root)?;
        fs::create_dir_all(&scratch_root)?;

        tracing::debug!(
            input = %input.display(),
            cache_root = %cache_root.display(),
            scratch_root = %scratch_root.display(),
            "created session"
        );

        Ok(Self {
            input,
            cache_root,
            scratch_root,
            transcoder: opts.transcoder,
            effects: Vec::new(),
            state: SessionState::Created,
        })
    }

    /// Creates a session, renders `effects` in order into `output`, and tears
    /// the session down again.
    pub fn apply_effects(
        input: impl Into<PathBuf>,
        output: &Path,
        effects: Vec<Box<dyn Effect>>,
        opts: SessionOpts,
    ) -> VdcrptResult<()> {
        let mut session = Self::new(input, opts)?;
        for effect in effects {
            session.add(effect)?;
        }
        session.render(output)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Queues an effect. Nothing runs until [`Session::render`].
    pub fn add(&mut self, effect: Box<dyn Effect>) -> VdcrptResult<&mut Self> {
        if self.state != SessionState::Created {
            return Err(VdcrptError::argument(format!(
                "cannot add effect '{}' once rendering has begun",
                effect.kind()
            )));
        }
        self.effects.push(effect);
        Ok(self)
    }

    /// Renders with [`TranscodeOptions::final_output`].
    pub fn render(&mut self, output: &Path) -> VdcrptResult<()> {
        self.render_with(output, &TranscodeOptions::final_output())
    }

    /// Runs every effect in order, then transcodes the result into `output`.
    ///
    /// Calling this again recomputes every intermediate file; caching that
    /// survives between renders happens inside effects.
    #[tracing::instrument(skip(self, opts), fields(effects = self.effects.len()))]
    pub fn render_with(&mut self, output: &Path, opts: &TranscodeOptions) -> VdcrptResult<()> {
        self.state = SessionState::Rendering;
        tracing::info!("render started");

        let result = self
            .run_effects()
            .and_then(|last| self.transcoder.transcode(&last, output, opts));

        self.state = match &result {
            Ok(()) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        };
        match &result {
            Ok(()) => tracing::info!(output = %output.display(), "render finished"),
            Err(e) => tracing::warn!(error = %e, "render failed"),
        }
        result
    }

    /// Empties the shared cache root.
    pub fn delete_cache(&self) -> VdcrptResult<()> {
        clear_cache(&self.cache_root)
    }

    fn run_effects(&mut self) -> VdcrptResult<PathBuf> {
        let mut current = self.input.clone();

        for (index, effect) in self.effects.iter_mut().enumerate() {
            let kind = effect.kind().to_string();
            let output = self.cache_root.join(format!("render-{index:04}"));
            // A leftover from an earlier render must not count as output.
            if output.exists() {
                fs::remove_file(&output)?;
            }

            let key = sanitize_file_name(&kind);
            let ctx = EffectContext::new(
                self.cache_root.join(&key),
                self.scratch_root
                    .join(format!("{key}-{}", uuid::Uuid::new_v4().simple())),
                self.transcoder.clone(),
            );

            tracing::debug!(index, kind = %kind, "applying effect");
            effect.apply(&ctx, &current, &output)?;

            if !output.is_file() {
                return Err(VdcrptError::pipeline(format!(
                    "effect #{index} '{kind}' did not produce '{}'",
                    output.display()
                )));
            }
            current = output;
        }

        Ok(current)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.scratch_root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    scratch_root = %self.scratch_root.display(),
                    error = %e,
                    "failed to remove session scratch directory"
                );
            }
        }
    }
}

/// Empties a cache root, leaving the directory itself in place.
pub fn clear_cache(cache_root: &Path) -> VdcrptResult<()> {
    match fs::remove_dir_all(cache_root) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(cache_root)?;
    Ok(())
}
