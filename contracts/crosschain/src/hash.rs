//! Hash computation for package verification
//!
//! The source chain commits each outgoing package under its package key. The
//! light client is asked to prove `keccak256(key || envelope)` at a height.

use common::package::package_key;
use common::ChannelId;
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Hash handed to the light client together with the proof.
pub fn compute_payload_hash(
    src_chain_id: u16,
    dest_chain_id: u16,
    channel_id: ChannelId,
    sequence: u64,
    payload: &[u8],
) -> [u8; 32] {
    let key = package_key(src_chain_id, dest_chain_id, channel_id, sequence);
    let mut hasher = Keccak::v256();
    hasher.update(&key);
    hasher.update(payload);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Convert bytes32 to 0x-prefixed hex string
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(&[]);
        assert_eq!(
            bytes32_to_hex(&hash),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_payload_hash_commits_to_key() {
        let payload = [0u8; 40];
        let base = compute_payload_hash(56, 97, 2, 0, &payload);

        assert_ne!(base, compute_payload_hash(56, 97, 2, 1, &payload));
        assert_ne!(base, compute_payload_hash(56, 97, 3, 0, &payload));
        assert_ne!(base, compute_payload_hash(97, 56, 2, 0, &payload));

        let mut preimage = package_key(56, 97, 2, 0).to_vec();
        preimage.extend_from_slice(&payload);
        assert_eq!(base, keccak256(&preimage));
    }
}
