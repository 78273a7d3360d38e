//! Content signatures and timestamp helpers.
//!
//! A signature is the BLAKE3 hash of a file's full byte content. It depends
//! on nothing but the bytes, so two files with identical content share the
//! same signature wherever they live.

use std::cmp::Ordering;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// BLAKE3 content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash an in-memory buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash the whole content of the file at `path`.
///
/// Large files are memory-mapped, small ones read through a buffer.
pub fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
    let mut hasher = Hasher::new();
    hasher.update_mmap(path)?;
    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Seconds since the Unix epoch, negative for earlier times.
pub fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Total order over two modification times expressed in epoch seconds.
pub fn compare_times(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}
