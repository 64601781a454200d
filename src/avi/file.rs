use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::ops::Range;
use std::path::Path;

use crate::avi::fourcc::FourCc;
use crate::error::{VdcrptError, VdcrptResult};

/// `RIFF`, declared size, `AVI `.
const RIFF_HEADER_LEN: usize = 12;
/// Tag + declared size.
const CHUNK_HEADER_LEN: usize = 8;
const INDEX_ENTRY_LEN: usize = 16;
/// `dwTotalFrames` in the main `avih` header.
const TOTAL_FRAMES_OFFSET: usize = 48;

/// `AVIIF_KEYFRAME` in an `idx1` entry.
pub const KEYFRAME_FLAG: u32 = 0x10;

/// One `idx1` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    pub id: FourCc,
    /// Index flags, carried through rewrites untouched.
    pub flag: u32,
    /// Position of the chunk header, relative to the `movi` list type tag.
    pub offset: u32,
    /// Payload length, excluding the chunk header and any pad byte.
    pub size: u32,
}

impl FrameRecord {
    pub fn is_keyframe(&self) -> bool {
        self.flag & KEYFRAME_FLAG != 0
    }
}

/// Working copy of an AVI file.
///
/// Frame offsets follow the common `idx1` convention: they are measured from
/// the `movi` list type tag, so the first chunk of the list sits at offset 4.
/// Some writers use absolute file offsets instead; those files are not
/// supported.
#[derive(Clone, Debug)]
pub struct AviFile {
    data: Vec<u8>,
    /// Absolute position of the `movi` type tag.
    movi_pos: usize,
    /// Absolute position of the `idx1` chunk header.
    idx1_pos: usize,
    frames: Vec<FrameRecord>,
}

impl AviFile {
    #[tracing::instrument]
    pub fn open(path: &Path) -> VdcrptResult<Self> {
        let data = fs::read(path)?;
        Self::parse(data)
    }

    pub fn parse(data: Vec<u8>) -> VdcrptResult<Self> {
        if data.len() < RIFF_HEADER_LEN {
            return Err(VdcrptError::format(format!(
                "{} bytes is too short for a RIFF header",
                data.len()
            )));
        }

        let mut pos = RIFF_HEADER_LEN;
        let mut movi_pos = None;
        let index_tag = loop {
            let tag = read_fourcc(&data, pos).ok_or_else(|| {
                VdcrptError::format_at(
                    FourCc::IDX1,
                    pos,
                    "reached end of file before the index table",
                )
            })?;
            if !tag.is_list_or_filler() {
                break tag;
            }

            let size = read_u32(&data, pos + 4)
                .ok_or_else(|| VdcrptError::format_at(tag, pos, "truncated chunk header"))?
                as usize;
            let body = pos + CHUNK_HEADER_LEN;
            if tag == FourCc::LIST
                && movi_pos.is_none()
                && read_fourcc(&data, body) == Some(FourCc::MOVI)
            {
                movi_pos = Some(body);
            }
            // Chunk bodies are word aligned.
            pos = body + size + (size & 1);
        };

        let movi_pos = movi_pos.ok_or_else(|| {
            VdcrptError::format_at(index_tag, pos, "no 'movi' list before the index table")
        })?;
        if index_tag != FourCc::IDX1 {
            return Err(VdcrptError::format_at(
                index_tag,
                pos,
                "expected the 'idx1' index table",
            ));
        }

        let idx1_pos = pos;
        let index_size = read_u32(&data, idx1_pos + 4)
            .ok_or_else(|| VdcrptError::format_at(index_tag, idx1_pos, "truncated chunk header"))?
            as usize;
        let start = idx1_pos + CHUNK_HEADER_LEN;
        let end = start + index_size;
        if end > data.len() {
            return Err(VdcrptError::format_at(
                index_tag,
                idx1_pos,
                format!(
                    "declared size {index_size} runs past end of file ({} bytes)",
                    data.len()
                ),
            ));
        }

        let frames = data[start..end]
            .chunks_exact(INDEX_ENTRY_LEN)
            .map(|entry| FrameRecord {
                id: FourCc([entry[0], entry[1], entry[2], entry[3]]),
                flag: le_u32(&entry[4..8]),
                offset: le_u32(&entry[8..12]),
                size: le_u32(&entry[12..16]),
            })
            .collect::<Vec<_>>();
        if index_size % INDEX_ENTRY_LEN != 0 {
            tracing::debug!(
                index_size,
                "ignoring trailing bytes after the last complete index entry"
            );
        }

        tracing::debug!(
            movi_pos,
            idx1_pos,
            frames = frames.len(),
            "parsed avi container"
        );

        Ok(Self {
            data,
            movi_pos,
            idx1_pos,
            frames,
        })
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn video_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.id.is_video()).count()
    }

    /// Absolute position of the `movi` list type tag.
    pub fn movi_position(&self) -> usize {
        self.movi_pos
    }

    /// Absolute position of the `idx1` chunk header.
    pub fn idx1_position(&self) -> usize {
        self.idx1_pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn frame_payload(&self, index: usize) -> VdcrptResult<&[u8]> {
        let frame = self.frames.get(index).ok_or_else(|| {
            VdcrptError::argument(format!(
                "frame index {index} out of range (have {})",
                self.frames.len()
            ))
        })?;
        Ok(&self.data[self.payload_range(frame)?])
    }

    /// Rewrites every frame payload in index order.
    ///
    /// `transform` may return a payload of any length. The `movi` list is
    /// rebuilt from the results, a fresh `idx1` table is appended after it,
    /// and the RIFF size and `avih` total-frame count are patched. If
    /// `transform` fails, the file is left unchanged.
    pub fn for_each_frame<F>(&mut self, mut transform: F) -> VdcrptResult<()>
    where
        F: FnMut(&FrameRecord, Vec<u8>) -> VdcrptResult<Vec<u8>>,
    {
        if self.movi_pos < TOTAL_FRAMES_OFFSET + 4 + CHUNK_HEADER_LEN {
            return Err(VdcrptError::format_at(
                FourCc::MOVI,
                self.movi_pos,
                "no room for a main header before the 'movi' list",
            ));
        }

        let mut stream = Vec::with_capacity(self.idx1_pos.saturating_sub(self.movi_pos));
        let mut rewritten = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let payload = self.data[self.payload_range(frame)?].to_vec();
            let payload = transform(frame, payload)?;

            let size = u32::try_from(payload.len()).map_err(|_| {
                VdcrptError::format_at(
                    frame.id,
                    self.movi_pos,
                    format!(
                        "rewritten payload of {} bytes does not fit a 32-bit chunk size",
                        payload.len()
                    ),
                )
            })?;
            let offset = self.movi_u32(FourCc::MOVI.as_bytes().len() + stream.len())?;

            stream.extend_from_slice(frame.id.as_bytes());
            stream.extend_from_slice(&size.to_le_bytes());
            stream.extend_from_slice(&payload);
            if payload.len() % 2 != 0 {
                stream.push(0);
            }

            rewritten.push(FrameRecord {
                offset,
                size,
                ..*frame
            });
        }

        self.rewrite(stream, rewritten)
    }

    /// Writes the working copy to `path`. With `overwrite == false` an
    /// existing file at `path` is an error.
    pub fn save(&self, path: &Path, overwrite: bool) -> VdcrptResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut opts = OpenOptions::new();
        opts.write(true);
        if overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }
        let mut file = opts.open(path)?;
        file.write_all(&self.data)?;
        file.sync_all()?;
        Ok(())
    }

    fn rewrite(&mut self, stream: Vec<u8>, frames: Vec<FrameRecord>) -> VdcrptResult<()> {
        let movi_size = self.movi_u32(FourCc::MOVI.as_bytes().len() + stream.len())?;
        let index_size = self.movi_u32(frames.len() * INDEX_ENTRY_LEN)?;
        let video_frames = self.movi_u32(frames.iter().filter(|f| f.id.is_video()).count())?;

        self.data.truncate(self.movi_pos + FourCc::MOVI.as_bytes().len());
        put_u32(&mut self.data, self.movi_pos - 4, movi_size);
        self.data.extend_from_slice(&stream);

        self.idx1_pos = self.data.len();
        self.data.reserve(CHUNK_HEADER_LEN + index_size as usize);
        self.data.extend_from_slice(FourCc::IDX1.as_bytes());
        self.data.extend_from_slice(&index_size.to_le_bytes());
        for frame in &frames {
            self.data.extend_from_slice(frame.id.as_bytes());
            self.data.extend_from_slice(&frame.flag.to_le_bytes());
            self.data.extend_from_slice(&frame.offset.to_le_bytes());
            self.data.extend_from_slice(&frame.size.to_le_bytes());
        }

        let riff_size = self.movi_u32(self.data.len() - CHUNK_HEADER_LEN)?;
        put_u32(&mut self.data, 4, riff_size);
        put_u32(&mut self.data, TOTAL_FRAMES_OFFSET, video_frames);

        tracing::debug!(
            frames = frames.len(),
            video_frames,
            bytes = self.data.len(),
            "rewrote avi container"
        );
        self.frames = frames;
        Ok(())
    }

    fn payload_range(&self, frame: &FrameRecord) -> VdcrptResult<Range<usize>> {
        let start = self.movi_pos + frame.offset as usize + CHUNK_HEADER_LEN;
        let end = start + frame.size as usize;
        if end > self.data.len() {
            return Err(VdcrptError::unexpected_eof(format!(
                "frame '{}' payload at bytes {start}..{end} runs past end of file ({} bytes)",
                frame.id,
                self.data.len()
            )));
        }
        Ok(start..end)
    }

    fn movi_u32(&self, value: usize) -> VdcrptResult<u32> {
        u32::try_from(value).map_err(|_| {
            VdcrptError::format_at(
                FourCc::MOVI,
                self.movi_pos,
                format!("{value} does not fit a 32-bit RIFF field"),
            )
        })
    }
}

fn read_fourcc(data: &[u8], pos: usize) -> Option<FourCc> {
    data.get(pos..pos.checked_add(4)?).and_then(FourCc::from_slice)
}

fn read_u32(data: &[u8], pos: usize) -> Option<u32> {
    data.get(pos..pos.checked_add(4)?).map(le_u32)
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn put_u32(data: &mut [u8], pos: usize, value: u32) {
    data[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(tag);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 != 0 {
            out.push(0);
        }
    }

    /// Minimal AVI: `hdrl` with a zeroed `avih`, a `JUNK` filler, `movi`, `idx1`.
    fn build_avi(frames: &[(&[u8; 4], u32, Vec<u8>)]) -> Vec<u8> {
        let mut hdrl = b"hdrl".to_vec();
        chunk(&mut hdrl, b"avih", &[0u8; 56]);

        let mut movi = b"movi".to_vec();
        let mut idx1 = Vec::new();
        for (id, flag, payload) in frames {
            let offset = movi.len() as u32;
            chunk(&mut movi, id, payload);
            idx1.extend_from_slice(*id);
            idx1.extend_from_slice(&flag.to_le_bytes());
            idx1.extend_from_slice(&offset.to_le_bytes());
            idx1.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        }

        let mut body = b"AVI ".to_vec();
        chunk(&mut body, b"LIST", &hdrl);
        chunk(&mut body, b"JUNK", &[0u8; 6]);
        chunk(&mut body, b"LIST", &movi);
        chunk(&mut body, b"idx1", &idx1);

        let mut out = Vec::new();
        chunk(&mut out, b"RIFF", &body);
        out
    }

    fn sample_frames() -> Vec<(&'static [u8; 4], u32, Vec<u8>)> {
        vec![
            (b"00dc", KEYFRAME_FLAG, vec![1, 2, 3, 4]),
            (b"01wb", 0, vec![9, 9, 9]),
            (b"00dc", 0, vec![5, 6, 7]),
        ]
    }

    #[test]
    fn parse_reads_index_in_file_order() {
        let avi = AviFile::parse(build_avi(&sample_frames())).unwrap();
        assert_eq!(avi.frame_count(), 3);
        assert_eq!(avi.video_frame_count(), 2);
        assert_eq!(avi.frames()[0].id, FourCc(*b"00dc"));
        assert!(avi.frames()[0].is_keyframe());
        assert_eq!(avi.frames()[0].offset, 4);
        assert_eq!(avi.frames()[1].id, FourCc(*b"01wb"));
        assert_eq!(avi.frame_payload(1).unwrap(), &[9, 9, 9]);
        assert_eq!(avi.frame_payload(2).unwrap(), &[5, 6, 7]);
        assert_eq!(&avi.as_bytes()[avi.movi_position()..][..4], b"movi");
        assert_eq!(&avi.as_bytes()[avi.idx1_position()..][..4], b"idx1");
    }

    #[test]
    fn parse_rejects_missing_movi() {
        let mut body = b"AVI ".to_vec();
        chunk(&mut body, b"idx1", &[]);
        let mut data = Vec::new();
        chunk(&mut data, b"RIFF", &body);

        let err = AviFile::parse(data).unwrap_err();
        assert!(matches!(err, VdcrptError::Format(_)));
        assert!(err.to_string().contains("movi"));
    }

    #[test]
    fn parse_rejects_missing_index() {
        let mut data = build_avi(&sample_frames());
        let idx1 = AviFile::parse(data.clone()).unwrap().idx1_position();
        data.truncate(idx1);

        let err = AviFile::parse(data).unwrap_err();
        assert!(matches!(err, VdcrptError::Format(_)));
    }

    #[test]
    fn parse_rejects_unexpected_chunk_in_place_of_index() {
        let mut data = build_avi(&sample_frames());
        let idx1 = AviFile::parse(data.clone()).unwrap().idx1_position();
        data[idx1..idx1 + 4].copy_from_slice(b"abcd");

        let err = AviFile::parse(data).unwrap_err().to_string();
        assert!(err.contains("abcd"), "{err}");
        assert!(err.contains(&idx1.to_string()), "{err}");
    }

    #[test]
    fn identity_rewrite_round_trips() {
        let original = build_avi(&sample_frames());
        let mut avi = AviFile::parse(original.clone()).unwrap();
        avi.for_each_frame(|_, data| Ok(data)).unwrap();

        let reparsed = AviFile::parse(avi.into_bytes()).unwrap();
        let before = AviFile::parse(original).unwrap();
        assert_eq!(reparsed.frame_count(), before.frame_count());
        for (i, (a, b)) in reparsed.frames().iter().zip(before.frames()).enumerate() {
            assert_eq!(a.id, b.id);
            assert_eq!(a.flag, b.flag);
            assert_eq!(reparsed.frame_payload(i).unwrap(), before.frame_payload(i).unwrap());
        }
    }

    #[test]
    fn rewrite_pads_odd_payloads_and_keeps_index_consistent() {
        let mut avi = AviFile::parse(build_avi(&sample_frames())).unwrap();
        avi.for_each_frame(|frame, mut data| {
            if frame.id.is_video() {
                data.push(0xee);
            }
            Ok(data)
        })
        .unwrap();

        let bytes = avi.as_bytes();
        let movi = avi.movi_position();
        for frame in avi.frames() {
            let header = movi + frame.offset as usize;
            assert_eq!(&bytes[header..header + 4], frame.id.as_bytes());
            assert_eq!(le_u32(&bytes[header + 4..header + 8]), frame.size);
            let footprint = frame.size as usize + (frame.size as usize & 1);
            assert_eq!(footprint % 2, 0);
            assert_eq!((header + CHUNK_HEADER_LEN + footprint - movi) % 2, 0);
        }
        assert_eq!(avi.frame_payload(0).unwrap(), &[1, 2, 3, 4, 0xee]);
        assert_eq!(avi.frame_payload(2).unwrap(), &[5, 6, 7, 0xee]);
    }

    #[test]
    fn rewrite_patches_riff_movi_and_frame_count() {
        let frames = (0..10)
            .map(|i| (b"00dc", 0, vec![i as u8; 3 + i]))
            .collect::<Vec<_>>();
        let mut avi = AviFile::parse(build_avi(&frames)).unwrap();
        avi.for_each_frame(|_, data| Ok(data)).unwrap();

        let bytes = avi.as_bytes();
        assert_eq!(le_u32(&bytes[4..8]) as usize, bytes.len() - 8);
        assert_eq!(le_u32(&bytes[TOTAL_FRAMES_OFFSET..TOTAL_FRAMES_OFFSET + 4]), 10);

        let movi = avi.movi_position();
        let movi_size = le_u32(&bytes[movi - 4..movi]) as usize;
        assert_eq!(movi + movi_size, avi.idx1_position());
        let idx1 = avi.idx1_position();
        assert_eq!(le_u32(&bytes[idx1 + 4..idx1 + 8]) as usize, 10 * INDEX_ENTRY_LEN);
        assert_eq!(idx1 + CHUNK_HEADER_LEN + 10 * INDEX_ENTRY_LEN, bytes.len());
    }

    #[test]
    fn failing_transform_leaves_file_untouched() {
        let original = build_avi(&sample_frames());
        let mut avi = AviFile::parse(original.clone()).unwrap();
        let err = avi
            .for_each_frame(|frame, data| {
                if frame.id.is_audio() {
                    Err(VdcrptError::argument("nope"))
                } else {
                    Ok(data)
                }
            })
            .unwrap_err();
        assert!(matches!(err, VdcrptError::Argument(_)));
        assert_eq!(avi.as_bytes(), original.as_slice());
    }

    #[test]
    fn payload_past_end_of_file_is_io_error() {
        let mut data = build_avi(&sample_frames());
        let avi = AviFile::parse(data.clone()).unwrap();
        // Point the last index entry far beyond the movi list.
        let last = avi.idx1_position() + CHUNK_HEADER_LEN + 2 * INDEX_ENTRY_LEN;
        data[last + 8..last + 12].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());

        let mut avi = AviFile::parse(data).unwrap();
        let err = avi.for_each_frame(|_, d| Ok(d)).unwrap_err();
        match err {
            VdcrptError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }
    }
}
