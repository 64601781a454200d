use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use sha2::Digest as _;

use crate::error::VdcrptResult;

/// Content key for the bytes of `path`.
///
/// Callers must treat the result as an opaque string; only equality is
/// meaningful.
pub fn content_key(path: &Path) -> VdcrptResult<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = sha2::Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hex(&hasher.finalize()))
}

/// Makes `name` usable as a single path component on every platform.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();

    // `.` and `..` would walk the directory tree.
    if sanitized.chars().all(|c| c == '.') {
        "_".repeat(sanitized.len())
    } else {
        sanitized
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_separators_and_reserved_chars() {
        assert_eq!(sanitize_file_name("a/b"), "a_b");
        assert_eq!(sanitize_file_name("a\\b:c"), "a_b_c");
        assert_eq!(sanitize_file_name("/\\$@\"!.,+"), "__$@_!.,+");
        assert_eq!(sanitize_file_name("v mpeg4_a pcm"), "v mpeg4_a pcm");
    }

    #[test]
    fn sanitize_neutralizes_dot_components() {
        assert_eq!(sanitize_file_name("."), "_");
        assert_eq!(sanitize_file_name(".."), "__");
        assert_eq!(sanitize_file_name("..a"), "..a");
    }

    #[test]
    fn content_key_follows_bytes_not_names() {
        let dir = std::env::temp_dir().join(format!(
            "vdcrpt_content_key_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.bin");
        let b = dir.join("b.bin");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let ka = content_key(&a).unwrap();
        assert_eq!(ka, content_key(&b).unwrap());
        assert_eq!(ka.len(), 64);

        std::fs::write(&b, b"other bytes").unwrap();
        assert_ne!(ka, content_key(&b).unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }
}
