use serde::Serialize;

use crate::fs::Result;

/// [blake3] hash of the on-disk encoding of an object
pub fn digest<T: Serialize>(t: &T) -> Result<[u8; 32]> {
    let encoded = bincode::serde::encode_to_vec(t, bincode::config::legacy())?;
    Ok(*blake3::hash(&encoded).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_follows_content() {
        let a = digest(&(1u32, 2u32)).unwrap();
        assert_eq!(a, digest(&(1u32, 2u32)).unwrap());
        assert_ne!(a, digest(&(1u32, 3u32)).unwrap());
        // fixint little endian, same bytes as a plain u64
        assert_eq!(digest(&(1u32, 0u32)).unwrap(), digest(&1u64).unwrap());
    }
}
