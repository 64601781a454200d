pub type VdcrptResult<T> = Result<T, VdcrptError>;

#[derive(thiserror::Error, Debug)]
pub enum VdcrptError {
    #[error("format error: {0}")]
    Format(String),

    #[error("argument error: {0}")]
    Argument(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("transcode error: {0}")]
    Transcode(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VdcrptError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Format error pinned to a chunk tag and absolute byte offset.
    pub fn format_at(tag: impl std::fmt::Display, offset: usize, msg: impl AsRef<str>) -> Self {
        Self::Format(format!("{} (chunk '{tag}' at byte {offset})", msg.as_ref()))
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn unexpected_eof(msg: impl Into<String>) -> Self {
        Self::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            msg.into(),
        ))
    }
}
