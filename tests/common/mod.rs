#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use vdcrpt::{TranscodeOptions, Transcoder, VdcrptResult};

pub fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "vdcrpt_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Stand-in for ffmpeg: copies bytes through and records every call.
#[derive(Default)]
pub struct RecordingTranscoder {
    calls: Mutex<Vec<(PathBuf, PathBuf, TranscodeOptions)>>,
}

impl RecordingTranscoder {
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, TranscodeOptions)> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that converted into a forced container format.
    pub fn conversions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|(_, _, opts)| opts.format.is_some())
            .count()
    }
}

impl Transcoder for RecordingTranscoder {
    fn transcode(&self, input: &Path, output: &Path, opts: &TranscodeOptions) -> VdcrptResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf(), opts.clone()));
        std::fs::copy(input, output)?;
        Ok(())
    }
}

fn chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 != 0 {
        out.push(0);
    }
}

/// Builds a small but structurally complete AVI (`hdrl`/`avih`, `JUNK`,
/// `movi`, `idx1`) whose `avih` total-frame count is left at zero.
pub fn build_avi(frames: &[([u8; 4], u32, Vec<u8>)]) -> Vec<u8> {
    let mut hdrl = b"hdrl".to_vec();
    chunk(&mut hdrl, b"avih", &[0u8; 56]);
    let mut strl = b"strl".to_vec();
    chunk(&mut strl, b"strh", &[0u8; 56]);
    let mut strl_list = Vec::new();
    chunk(&mut strl_list, b"LIST", &strl);
    hdrl.extend_from_slice(&strl_list);

    let mut movi = b"movi".to_vec();
    let mut idx1 = Vec::new();
    for (id, flag, payload) in frames {
        let offset = movi.len() as u32;
        chunk(&mut movi, id, payload);
        idx1.extend_from_slice(id);
        idx1.extend_from_slice(&flag.to_le_bytes());
        idx1.extend_from_slice(&offset.to_le_bytes());
        idx1.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    }

    let mut body = b"AVI ".to_vec();
    chunk(&mut body, b"LIST", &hdrl);
    chunk(&mut body, b"JUNK", &[0u8; 10]);
    chunk(&mut body, b"LIST", &movi);
    chunk(&mut body, b"idx1", &idx1);

    let mut out = Vec::new();
    chunk(&mut out, b"RIFF", &body);
    out
}

/// `count` video frames of alternating odd and even size, the first one a key frame.
pub fn video_frames(count: usize, base_len: usize) -> Vec<([u8; 4], u32, Vec<u8>)> {
    (0..count)
        .map(|i| {
            let flag = if i == 0 { 0x10 } else { 0 };
            let payload = (0..base_len + i).map(|b| (b * 7 + i) as u8).collect();
            (*b"00dc", flag, payload)
        })
        .collect()
}

pub fn read_u32(bytes: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
}
