//! Two-tier TTL cache with tag invalidation.
//!
//! - [`MemoryCache`]: bounded in-process tier (mini-moka)
//! - [`SqliteCache`]: durable tier sharing the application database
//! - [`CacheStore`]: the facade everything else talks to

mod memory;
mod sqlite;
mod store;
mod traits;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use store::{CacheCounts, CacheStats, CacheStore, ClearScope};
pub use traits::{BackendKind, BackendStats, CacheBackend, CacheEntry};

use sha2::{Digest, Sha256};

/// Build a namespaced cache key from the SHA-256 of `parts`.
///
/// Parts are separated by a unit separator so `("ab", "c")` and
/// `("a", "bc")` never collide.
pub fn fingerprint(namespace: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    format!("{}:{}", namespace, hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_namespaced() {
        let a = fingerprint("search", &["rust", "5"]);
        assert_eq!(a, fingerprint("search", &["rust", "5"]));
        assert!(a.starts_with("search:"));
        assert_eq!(a.len(), "search:".len() + 64);
    }

    #[test]
    fn test_fingerprint_separates_parts() {
        assert_ne!(fingerprint("k", &["ab", "c"]), fingerprint("k", &["a", "bc"]));
        assert_ne!(fingerprint("a", &["x"]), fingerprint("b", &["x"]));
    }
}
