use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::content_key;
use crate::error::{VdcrptError, VdcrptResult};
use crate::transcode::{TranscodeOptions, Transcoder};

/// A cache path and whether something was already stored there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedFile {
    pub path: PathBuf,
    pub exists: bool,
}

/// File locations handed to one effect invocation.
///
/// Cached files live under a directory shared by every instance of the same
/// effect type and survive the session, so anything that distinguishes two
/// instances must be part of the key. Scratch files are unique per call and
/// are deleted with the session.
#[derive(Clone)]
pub struct EffectContext {
    cache_dir: PathBuf,
    scratch_dir: PathBuf,
    transcoder: Arc<dyn Transcoder>,
}

impl std::fmt::Debug for EffectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectContext")
            .field("cache_dir", &self.cache_dir)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl EffectContext {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            scratch_dir: scratch_dir.into(),
            transcoder,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// A fresh path inside the scratch directory. `extension` may be empty.
    pub fn scratch_file(&self, extension: &str) -> VdcrptResult<PathBuf> {
        fs::create_dir_all(&self.scratch_dir)?;
        let name = uuid::Uuid::new_v4().simple().to_string();
        Ok(with_extension(self.scratch_dir.join(name), extension))
    }

    /// Cache path for a single key.
    pub fn cached_file(&self, key: &str, extension: &str) -> VdcrptResult<CachedFile> {
        self.cached_file_parts(&[key], extension)
    }

    /// Cache path for an ordered compound key.
    ///
    /// Every part is escaped and becomes one path level. Directory levels
    /// and the leaf file live in separate namespaces (`k-` and `v-`), so a
    /// key that is a prefix of another never lands on a directory, and
    /// escaped parts contain no `.`, so the extension cannot be confused
    /// with the key. The parent directory exists when this returns.
    pub fn cached_file_parts<S: AsRef<str>>(
        &self,
        parts: &[S],
        extension: &str,
    ) -> VdcrptResult<CachedFile> {
        let Some((last, dirs)) = parts.split_last() else {
            return Err(VdcrptError::argument("cache key must have at least one part"));
        };

        let mut path = self.cache_dir.clone();
        for part in dirs {
            path.push(format!("k-{}", escape_key_part(non_empty(part.as_ref())?)));
        }
        let leaf = format!("v-{}", escape_key_part(non_empty(last.as_ref())?));
        fs::create_dir_all(&path)?;
        path.push(leaf);

        let path = with_extension(
            path,
            &escape_key_part(extension.trim_start_matches('.')),
        );
        let exists = path.is_file();
        tracing::debug!(path = %path.display(), exists, "cache lookup");
        Ok(CachedFile { path, exists })
    }

    /// Cache path keyed on the bytes of `original` plus `derived_key`, so a
    /// changed input never hits a stale entry.
    pub fn derive_cached_file(
        &self,
        original: &Path,
        derived_key: &str,
        extension: &str,
    ) -> VdcrptResult<CachedFile> {
        let hash = content_key(original)?;
        self.cached_file_parts(&[hash.as_str(), derived_key], extension)
    }

    /// Transcodes `input` into the given codecs and container, reusing an
    /// earlier result for the same input bytes when one is cached.
    pub fn convert_cached(
        &self,
        input: &Path,
        video_codec: &str,
        audio_codec: &str,
        format: &str,
    ) -> VdcrptResult<PathBuf> {
        let cached = self.derive_cached_file(
            input,
            &format!("v{video_codec}_a{audio_codec}"),
            format,
        )?;
        if cached.exists {
            tracing::debug!(path = %cached.path.display(), "reusing cached conversion");
            return Ok(cached.path);
        }

        let opts = TranscodeOptions::convert(video_codec, audio_codec, format);
        self.write_cached(&cached.path, |tmp| {
            self.transcoder.transcode(input, tmp, &opts)
        })?;
        Ok(cached.path)
    }

    /// Produces `path` through `write`, which receives a temporary name in
    /// the same directory. The result only appears under `path` once `write`
    /// has succeeded.
    pub fn write_cached<F>(&self, path: &Path, write: F) -> VdcrptResult<()>
    where
        F: FnOnce(&Path) -> VdcrptResult<()>,
    {
        let file_name = path
            .file_name()
            .ok_or_else(|| VdcrptError::argument("cache path has no file name"))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".partial-{}", uuid::Uuid::new_v4().simple()));
        // Keep the real extension last so tools that sniff it still work.
        let tmp = with_extension(
            path.with_file_name(tmp_name),
            &path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        if let Err(e) = write(&tmp) {
            fs::remove_file(&tmp).ok();
            return Err(e);
        }
        if !tmp.is_file() {
            return Err(VdcrptError::pipeline(format!(
                "nothing was written for cache entry '{}'",
                path.display()
            )));
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn non_empty(part: &str) -> VdcrptResult<&str> {
    if part.is_empty() {
        return Err(VdcrptError::argument("cache key parts must be non-empty"));
    }
    Ok(part)
}

/// Reversible encoding of a key part into `[A-Za-z0-9_~%-]`.
fn escape_key_part(part: &str) -> String {
    urlencoding::encode(part).replace('.', "%2E")
}

fn with_extension(path: PathBuf, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
