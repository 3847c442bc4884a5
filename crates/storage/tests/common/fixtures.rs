use blober_storage::ByteStream;
use bytes::Bytes;
use futures::TryStreamExt;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data as hex string
#[allow(dead_code)]
pub fn sha256_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Deterministic pseudo-random payload; the same seed gives the same bytes.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Drain a byte stream into one buffer.
#[allow(dead_code)]
pub async fn collect_stream(stream: ByteStream) -> Vec<u8> {
    let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
    chunks.concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hash() {
        assert_eq!(
            sha256_hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_seeded_bytes_deterministic() {
        assert_eq!(seeded_bytes(42, 1000), seeded_bytes(42, 1000));
        assert_ne!(seeded_bytes(42, 1000), seeded_bytes(43, 1000));
    }
}
