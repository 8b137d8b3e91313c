//! Hash fan-out from file-ids to relative directory paths.
//!
//! A file's directory is derived from a 32-bit hash of its id, rendered as
//! fixed-width hex and split into bounded chunks, one directory level per
//! chunk. The hash function is the 31-multiplier rolling sum over UTF-16
//! code units used by the original deployment; it must not change, or
//! existing on-disk directories become unresolvable.

use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Capacity of the per-instance path memoization cache.
const PATH_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(2048).unwrap();

/// Whether `:` is reserved in filenames on this host.
const COLON_RESERVED: bool = cfg!(windows);

/// The 31-multiplier rolling string hash, over UTF-16 code units,
/// truncated to 32 bits with wrapping arithmetic.
pub fn hash32(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Render a 32-bit hash as 16 lowercase hex characters.
///
/// The value is sign-extended to 64 bits first, so negative hashes render
/// with leading `f`s. This matches the historical on-disk trees and must be
/// kept.
fn render_hash(hash: i32) -> String {
    format!("{:016x}", hash as i64 as u64)
}

/// Escape a file-id for use as a directory name.
///
/// On hosts where `:` is reserved it becomes `_`; [`unescape_file_id`]
/// reverses the transform on enumeration output.
pub(crate) fn escape_file_id(file_id: &str) -> Cow<'_, str> {
    if COLON_RESERVED && file_id.contains(':') {
        Cow::Owned(file_id.replace(':', "_"))
    } else {
        Cow::Borrowed(file_id)
    }
}

/// Reverse [`escape_file_id`] on a directory name read back from disk.
pub(crate) fn unescape_file_id(name: &str) -> Cow<'_, str> {
    if COLON_RESERVED && name.contains('_') {
        Cow::Owned(name.replace('_', ":"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Derives and memoizes per-file relative directory paths.
#[derive(Debug)]
pub struct PathHasher {
    /// Hex characters per directory level.
    prefix_length: usize,

    /// Total hash characters consumed by the fan-out.
    hash_cut_length: usize,

    /// Memoized results keyed by the original (unescaped) file-id.
    cache: Mutex<LruCache<String, String>>,
}

impl PathHasher {
    /// Build a hasher for the given fan-out bounds.
    pub fn new(max_subdirs_per_dir: u32, max_dir_depth: u32) -> Self {
        // ceil(log16(max + 1)): the number of hex digits of the largest
        // subdirectory index.
        let mut prefix_length = 1;
        let mut rest = max_subdirs_per_dir >> 4;
        while rest > 0 {
            prefix_length += 1;
            rest >>= 4;
        }

        let hash_cut_length = (max_dir_depth as usize * prefix_length).min(16);

        Self {
            prefix_length,
            hash_cut_length,
            cache: Mutex::new(LruCache::new(PATH_CACHE_CAPACITY)),
        }
    }

    /// Relative directory path for `file_id`, always ending in `/`.
    ///
    /// The result is `<chunk>/<chunk>/.../<fileIdSafe>/` where the chunks
    /// are successive `prefix_length`-character slices of the rendered
    /// hash, at most `max_dir_depth` of them.
    pub fn relative_path(&self, file_id: &str) -> String {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(file_id)
        {
            return hit.clone();
        }

        let rendered = render_hash(hash32(file_id));
        let prefix = &rendered[..self.hash_cut_length];

        let mut path = String::with_capacity(self.hash_cut_length + file_id.len() + 8);
        let mut chunk = prefix;
        while !chunk.is_empty() {
            let split = chunk.len().min(self.prefix_length);
            path.push_str(&chunk[..split]);
            path.push('/');
            chunk = &chunk[split..];
        }
        path.push_str(&escape_file_id(file_id));
        path.push('/');

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(file_id.to_string(), path.clone());
        path
    }

    /// Hex characters per directory level.
    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    /// Total hash characters consumed by the fan-out.
    pub fn hash_cut_length(&self) -> usize {
        self.hash_cut_length
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_hash32_known_values() {
        assert_eq!(hash32(""), 0);
        assert_eq!(hash32("a"), 97);
        // 'F' * 31 + '1' = 70 * 31 + 49
        assert_eq!(hash32("F1"), 2219);
        assert_eq!(hash32("abc"), 96354);
        // The classic minimal-hash string.
        assert_eq!(hash32("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_render_sign_extends_negative_hashes() {
        assert_eq!(render_hash(i32::MIN), "ffffffff80000000");
        assert_eq!(render_hash(-1), "ffffffffffffffff");
        assert_eq!(render_hash(0x1234), "0000000000001234");
    }

    #[test]
    fn test_prefix_length_from_subdir_bound() {
        assert_eq!(PathHasher::new(15, 4).prefix_length(), 1);
        assert_eq!(PathHasher::new(255, 4).prefix_length(), 2);
        assert_eq!(PathHasher::new(256, 4).prefix_length(), 3);
        assert_eq!(PathHasher::new(4095, 4).prefix_length(), 3);
    }

    #[test]
    fn test_hash_cut_is_capped_at_hash_length() {
        // 8 levels of 3 chars would need 24 hash chars; only 16 exist.
        let hasher = PathHasher::new(4095, 8);
        assert_eq!(hasher.hash_cut_length(), 16);
    }

    #[test]
    fn test_relative_path_shape() {
        let hasher = PathHasher::new(255, 4);
        let path = hasher.relative_path("F1");
        // hash32("F1") = 2219 = 0x8ab
        assert_eq!(path, "00/00/00/00/F1/");
    }

    #[test]
    fn test_relative_path_negative_hash() {
        let hasher = PathHasher::new(255, 4);
        let path = hasher.relative_path("polygenelubricants");
        assert_eq!(path, "ff/ff/ff/ff/polygenelubricants/");
    }

    #[test]
    fn test_relative_path_partial_tail_chunk() {
        // prefix 3, depth 6: cut = 18 capped to 16, tail chunk is 1 char.
        let hasher = PathHasher::new(4095, 6);
        let path = hasher.relative_path("F1");
        assert_eq!(path, "000/000/000/000/08a/b/F1/");
    }

    #[test]
    fn test_memoization_returns_identical_paths() {
        let hasher = PathHasher::new(255, 4);
        let first = hasher.relative_path("volume:17");
        let second = hasher.relative_path("volume:17");
        assert_eq!(first, second);
    }

    #[test]
    fn test_escape_round_trip() {
        let escaped = escape_file_id("vol:42");
        assert_eq!(unescape_file_id(&escaped), "vol:42");
    }

    proptest! {
        #[test]
        fn prop_path_is_deterministic(file_id in ".{0,64}") {
            let a = PathHasher::new(255, 4);
            let b = PathHasher::new(255, 4);
            prop_assert_eq!(a.relative_path(&file_id), b.relative_path(&file_id));
        }

        #[test]
        fn prop_path_ends_with_slash(file_id in "[a-zA-Z0-9:._-]{1,64}") {
            let hasher = PathHasher::new(255, 4);
            prop_assert!(hasher.relative_path(&file_id).ends_with('/'));
        }

        #[test]
        fn prop_depth_bound(
            file_id in "[a-zA-Z0-9:._-]{1,64}",
            max_subdirs in 1u32..=65535,
            depth in 1u32..=8,
        ) {
            let hasher = PathHasher::new(max_subdirs, depth);
            let path = hasher.relative_path(&file_id);
            // Components minus the file-id directory itself.
            let hash_levels = path.split('/').filter(|c| !c.is_empty()).count() - 1;
            prop_assert!(hash_levels <= depth as usize);
        }
    }
}
