//! Deterministic 64-bit content hashing.
//!
//! Every value is folded into a running state as `hash(bytes, state) -> state`
//! over an explicit byte span, so the result only depends on the bytes fed in
//! and their order (never on in-memory layout of the caller's types).

use bytemuck::Pod;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Initial state of a fresh [`ContentHasher`].
pub const HASH_SEED: u64 = 0x5354_4950_504c_4531;

/// Folds `bytes` into `state` and returns the new state.
///
/// The fold is XXH3-64 with the running state as seed, so
/// `hash_bytes(b, hash_bytes(a, s)) != hash_bytes(a, hash_bytes(b, s))` in
/// general, and `[]` and `[0]` differ.
#[inline]
pub fn hash_bytes(bytes: &[u8], state: u64) -> u64 {
    xxh3_64_with_seed(bytes, state)
}

/// Running content hash.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ContentHasher {
    state: u64,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    pub const fn new() -> Self {
        Self { state: HASH_SEED }
    }

    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> &mut Self {
        self.state = hash_bytes(bytes, self.state);
        self
    }

    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> &mut Self {
        self.write(bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) -> &mut Self {
        self.write(bytemuck::cast_slice(values))
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write(s.as_bytes())
    }

    #[inline]
    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.write(&[v])
    }

    #[inline]
    pub fn finish(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash_bytes(b"points", 7), hash_bytes(b"points", 7));
    }

    #[test]
    fn folds_with_xxh3() {
        assert_eq!(hash_bytes(b"points", 7), xxh3_64_with_seed(b"points", 7));
        let mut h = ContentHasher::new();
        h.write(b"a").write(b"b");
        let expected = xxh3_64_with_seed(b"b", xxh3_64_with_seed(b"a", HASH_SEED));
        assert_eq!(h.finish(), expected);
    }

    #[test]
    fn state_participates() {
        assert_ne!(hash_bytes(b"points", 7), hash_bytes(b"points", 8));
    }

    #[test]
    fn length_participates() {
        assert_ne!(hash_bytes(&[], HASH_SEED), hash_bytes(&[0], HASH_SEED));
        assert_ne!(hash_bytes(&[0; 8], HASH_SEED), hash_bytes(&[0; 9], HASH_SEED));
    }

    #[test]
    fn order_sensitive() {
        let mut ab = ContentHasher::new();
        ab.write(b"a").write(b"b");
        let mut ba = ContentHasher::new();
        ba.write(b"b").write(b"a");
        assert_ne!(ab.finish(), ba.finish());
    }

    #[test]
    fn single_bit_flip_changes_hash() {
        let a = [0u8; 32];
        let mut b = a;
        b[17] = 1;
        assert_ne!(hash_bytes(&a, HASH_SEED), hash_bytes(&b, HASH_SEED));
    }

    #[test]
    fn pod_and_slice_agree_with_raw_bytes() {
        let v = [1.0f32, 2.0, 3.0];
        let mut a = ContentHasher::new();
        a.write_slice(&v);
        let mut b = ContentHasher::new();
        b.write(bytemuck::cast_slice(&v));
        assert_eq!(a.finish(), b.finish());
    }
}
