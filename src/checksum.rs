//! Payload checksumming.
//!
//! Object payloads carry an optional 64-bit integrity value encoded into the
//! object filename. The algorithm is resolved by name from a pluggable
//! factory at engine construction; when the lookup fails, checksumming is
//! silently disabled for the lifetime of the process and an ERROR is
//! logged. A disabled engine returns 0 and no verification occurs.

use std::collections::HashMap;
use std::sync::Mutex;

/// A resettable 64-bit checksum over a byte stream.
///
/// Implementations are stateful and not thread-safe; the engine serializes
/// access and resets the algorithm before every computation.
pub trait ChecksumAlgorithm: Send {
    /// Clear all accumulated state.
    fn reset(&mut self);

    /// Feed a chunk of payload.
    fn update(&mut self, data: &[u8]);

    /// Produce the checksum over everything fed since the last reset.
    fn finalize(&mut self) -> u64;
}

/// BLAKE3-based checksum: the first 8 bytes of the digest, big-endian.
pub struct Blake3Sum {
    hasher: blake3::Hasher,
}

impl Blake3Sum {
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
        }
    }
}

impl Default for Blake3Sum {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumAlgorithm for Blake3Sum {
    fn reset(&mut self) {
        self.hasher.reset();
    }

    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(&mut self) -> u64 {
        let digest = self.hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_be_bytes(word)
    }
}

type AlgorithmConstructor = fn() -> Box<dyn ChecksumAlgorithm>;

/// Registry of checksum algorithms, keyed by configuration name.
pub struct ChecksumFactory {
    registry: HashMap<String, AlgorithmConstructor>,
}

impl ChecksumFactory {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Register an algorithm constructor under a name.
    pub fn register(&mut self, name: impl Into<String>, constructor: AlgorithmConstructor) {
        self.registry.insert(name.into(), constructor);
    }

    /// Instantiate the algorithm registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Box<dyn ChecksumAlgorithm>> {
        self.registry.get(name).map(|constructor| constructor())
    }
}

impl Default for ChecksumFactory {
    /// The built-in registry: `"blake3"`.
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register("blake3", || Box::new(Blake3Sum::new()));
        factory
    }
}

/// The per-layout checksum engine.
///
/// Holds a single algorithm instance behind a lock; concurrent callers on
/// unrelated files serialize here, which is acceptable because checksums
/// are computed over in-memory payloads only.
pub struct ChecksumEngine {
    algorithm: Option<Mutex<Box<dyn ChecksumAlgorithm>>>,
}

impl std::fmt::Debug for ChecksumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumEngine")
            .field("enabled", &self.algorithm.is_some())
            .finish()
    }
}

impl ChecksumEngine {
    /// Build the engine from configuration.
    ///
    /// When `enabled` is set but `name` is not present in the factory, an
    /// ERROR is logged and the engine runs with checksums disabled for the
    /// rest of the process lifetime.
    pub fn new(enabled: bool, name: &str, factory: &ChecksumFactory) -> Self {
        let algorithm = if enabled {
            match factory.get(name) {
                Some(algorithm) => Some(Mutex::new(algorithm)),
                None => {
                    log::error!(
                        "checksum algorithm '{name}' is not available, disabling checksums"
                    );
                    None
                }
            }
        } else {
            None
        };
        Self { algorithm }
    }

    /// An engine with checksums off.
    pub fn disabled() -> Self {
        Self { algorithm: None }
    }

    /// Whether checksums are computed and verified.
    pub fn enabled(&self) -> bool {
        self.algorithm.is_some()
    }

    /// Checksum a payload. Returns 0 when disabled.
    pub fn checksum(&self, data: &[u8]) -> u64 {
        match &self.algorithm {
            None => 0,
            Some(locked) => {
                let mut algorithm = locked.lock().unwrap_or_else(|e| e.into_inner());
                algorithm.reset();
                algorithm.update(data);
                algorithm.finalize()
            }
        }
    }

    /// Checksum for a hole of `size` zero bytes (padding objects).
    pub fn checksum_of_zeroes(&self, size: usize) -> u64 {
        if !self.enabled() {
            return 0;
        }
        self.checksum(&vec![0u8; size])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_engine_returns_zero() {
        let engine = ChecksumEngine::disabled();
        assert!(!engine.enabled());
        assert_eq!(engine.checksum(b"payload"), 0);
        assert_eq!(engine.checksum_of_zeroes(4096), 0);
    }

    #[test]
    fn test_blake3_engine_is_deterministic() {
        let factory = ChecksumFactory::default();
        let engine = ChecksumEngine::new(true, "blake3", &factory);
        assert!(engine.enabled());

        let first = engine.checksum(b"hello world");
        let second = engine.checksum(b"hello world");
        assert_eq!(first, second);
        assert_ne!(first, 0);
        assert_ne!(first, engine.checksum(b"hello worle"));
    }

    #[test]
    fn test_engine_resets_between_calls() {
        let factory = ChecksumFactory::default();
        let engine = ChecksumEngine::new(true, "blake3", &factory);

        // A second computation must not see the first payload.
        let isolated = engine.checksum(b"bb");
        engine.checksum(b"aa");
        assert_eq!(engine.checksum(b"bb"), isolated);
    }

    #[test]
    fn test_unknown_algorithm_disables_checksums() {
        let factory = ChecksumFactory::default();
        let engine = ChecksumEngine::new(true, "crc-1337", &factory);
        assert!(!engine.enabled());
        assert_eq!(engine.checksum(b"payload"), 0);
    }

    #[test]
    fn test_custom_algorithm_registration() {
        struct ByteSum(u64);
        impl ChecksumAlgorithm for ByteSum {
            fn reset(&mut self) {
                self.0 = 0;
            }
            fn update(&mut self, data: &[u8]) {
                self.0 += data.iter().map(|b| *b as u64).sum::<u64>();
            }
            fn finalize(&mut self) -> u64 {
                self.0
            }
        }

        let mut factory = ChecksumFactory::empty();
        factory.register("bytesum", || Box::new(ByteSum(0)));

        let engine = ChecksumEngine::new(true, "bytesum", &factory);
        assert_eq!(engine.checksum(&[1, 2, 3]), 6);
    }
}
