use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

/// hash_of hashes any hashable value with a fixed seed, so the result is stable for
/// the lifetime of the process and across processes.
pub fn hash_of<T: Hash + ?Sized>(v: &T) -> u64 {
    let mut h = XxHash64::with_seed(0);
    v.hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use crate::hash::hash_of;

    #[test]
    fn test_hash_stable() {
        assert_eq!(hash_of("cpu"), hash_of("cpu"));
        assert_ne!(hash_of("cpu"), hash_of("mem"));
        assert_eq!(hash_of(&7_u64), hash_of(&7_u64));
    }
}
