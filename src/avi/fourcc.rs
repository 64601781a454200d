use std::fmt;

/// A four-character RIFF chunk tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: Self = Self(*b"RIFF");
    pub const LIST: Self = Self(*b"LIST");
    pub const JUNK: Self = Self(*b"JUNK");
    pub const MOVI: Self = Self(*b"movi");
    pub const IDX1: Self = Self(*b"idx1");

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 4]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// `##db` (uncompressed) and `##dc` (compressed) chunks carry video frames.
    pub fn is_video(&self) -> bool {
        matches!(&self.0[2..], b"db" | b"dc")
    }

    /// `##wb` chunks carry audio.
    pub fn is_audio(&self) -> bool {
        &self.0[2..] == b"wb"
    }

    /// Lists and filler are walked over when looking for the index.
    pub(crate) fn is_list_or_filler(&self) -> bool {
        *self == Self::LIST || *self == Self::JUNK
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}
