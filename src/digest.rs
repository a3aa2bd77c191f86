//! The digest primitive: `digest(path) -> (hex, ok)`.
//!
//! The core treats this as an opaque external collaborator (§1 of the
//! spec); this module supplies the concrete SHA-256 implementation the
//! reference server runs against.

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

use sha2::{Digest as _, Sha256};

/// Digest of the empty byte string, matching the empty-file boundary case.
pub const EMPTY_DIGEST_HEX: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Computes the SHA-256 hex digest of a file's contents.
///
/// Implementations are invoked by at most one worker per distinct path at a
/// time (the cache's duplicate-suppression protocol guarantees this); they
/// need not be reentrant for a single path, only `Send + Sync` across
/// distinct paths.
pub trait DigestFn: Send + Sync {
    /// Returns `(hex_digest, true)` on success, or `(String::new(), false)`
    /// if the file could not be opened or read.
    fn digest(&self, path: &str) -> (String, bool);
}

/// Streams a file through SHA-256 in fixed-size chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDigest;

impl DigestFn for FileDigest {
    fn digest(&self, path: &str) -> (String, bool) {
        match hash_file(path) {
            Ok(hex) => (hex, true),
            Err(e) => {
                log::warn!("digest failed for {path}: {e}");
                (String::new(), false)
            }
        }
    }
}

fn hash_file(path: &str) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Wraps a [`DigestFn`] and counts invocations per path, for tests that must
/// verify the uniqueness-of-computation invariant (§8, property 1).
pub struct CountingDigestFn<F> {
    inner: F,
    calls: AtomicUsize,
}

impl<F: DigestFn> CountingDigestFn<F> {
    /// Wrap `inner`, starting the call counter at zero.
    pub fn new(inner: F) -> Self {
        CountingDigestFn {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Total number of times [`DigestFn::digest`] has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F: DigestFn> DigestFn for CountingDigestFn<F> {
    fn digest(&self, path: &str) -> (String, bool) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.digest(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_the_known_empty_digest() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (hex, ok) = FileDigest.digest(file.path().to_str().unwrap());
        assert!(ok);
        assert_eq!(hex, EMPTY_DIGEST_HEX);
    }

    #[test]
    fn missing_file_reports_failure() {
        let (hex, ok) = FileDigest.digest("/does/not/exist/at/all");
        assert!(!ok);
        assert_eq!(hex, "");
    }

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let (hex, ok) = FileDigest.digest(file.path().to_str().unwrap());
        assert!(ok);
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn counting_wrapper_tracks_invocations() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let counting = CountingDigestFn::new(FileDigest);
        for _ in 0..3 {
            counting.digest(file.path().to_str().unwrap());
        }
        assert_eq!(counting.call_count(), 3);
    }
}
