use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

/// Hash of several byte slices, length-prefixed so ("ab","c") != ("a","bc").
pub fn sha256_hex_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut h = Sha256::new();
    for p in parts {
        h.update((p.len() as u64).to_le_bytes());
        h.update(p);
    }
    format!("{:x}", h.finalize())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Byte index of the char boundary `n` chars after `from`, clamped to `s.len()`.
pub fn advance_chars(s: &str, from: usize, n: usize) -> usize {
    match s[from..].char_indices().nth(n) {
        Some((i, _)) => from + i,
        None => s.len(),
    }
}

/// Byte index of the char boundary `n` chars before `from`, clamped to 0.
pub fn retreat_chars(s: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    match s[..from].char_indices().rev().nth(n - 1) {
        Some((i, _)) => i,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_walks_respect_multibyte() {
        let s = "aé漢b";
        assert_eq!(advance_chars(s, 0, 2), 3);
        assert_eq!(advance_chars(s, 0, 10), s.len());
        assert_eq!(retreat_chars(s, s.len(), 1), 6);
        assert_eq!(retreat_chars(s, s.len(), 2), 3);
        assert_eq!(retreat_chars(s, 3, 10), 0);
    }

    #[test]
    fn parts_hash_is_length_prefixed() {
        let a = sha256_hex_parts([b"ab".as_slice(), b"c".as_slice()]);
        let b = sha256_hex_parts([b"a".as_slice(), b"bc".as_slice()]);
        assert_ne!(a, b);
    }
}
