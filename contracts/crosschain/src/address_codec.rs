//! Address encoding between the two chains.
//!
//! Two kinds of addresses travel inside package payloads:
//!
//! - **Remote addresses**: 20 raw bytes, written as `0x`-prefixed hex in
//!   messages and events.
//! - **Local addresses**: the canonical bytes of an account on this chain,
//!   produced by `Api::addr_canonicalize`. Their length depends on the chain.

use cosmwasm_std::{Addr, Api, CanonicalAddr, StdError, StdResult};

/// Byte length of an address on the other chain.
pub const REMOTE_ADDRESS_LEN: usize = 20;

/// A 20-byte account on the other chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddress(pub [u8; REMOTE_ADDRESS_LEN]);

impl RemoteAddress {
    /// Parse a 0x-prefixed (or bare) 40 character hex string.
    pub fn from_hex(addr: &str) -> StdResult<Self> {
        parse_remote_address(addr).map(Self)
    }

    /// Interpret raw payload bytes, which must be exactly 20 long.
    pub fn from_slice(bytes: &[u8]) -> StdResult<Self> {
        if bytes.len() != REMOTE_ADDRESS_LEN {
            return Err(StdError::generic_err(format!(
                "Invalid remote address length: expected {}, got {}",
                REMOTE_ADDRESS_LEN,
                bytes.len()
            )));
        }
        let mut raw = [0u8; REMOTE_ADDRESS_LEN];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        encode_remote_address(&self.0)
    }
}

/// Parse a remote address from hex.
pub fn parse_remote_address(addr: &str) -> StdResult<[u8; REMOTE_ADDRESS_LEN]> {
    let hex_str = addr.strip_prefix("0x").unwrap_or(addr);

    if hex_str.len() != REMOTE_ADDRESS_LEN * 2 {
        return Err(StdError::generic_err(format!(
            "Invalid remote address length: expected 40 hex chars, got {}",
            hex_str.len()
        )));
    }

    let bytes = hex::decode(hex_str)
        .map_err(|e| StdError::generic_err(format!("Invalid hex in remote address: {}", e)))?;

    let mut result = [0u8; REMOTE_ADDRESS_LEN];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Encode a remote address as lowercase 0x-prefixed hex.
pub fn encode_remote_address(bytes: &[u8; REMOTE_ADDRESS_LEN]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================================================
// Local Addresses
// ============================================================================

/// Canonical payload bytes for a local account.
pub fn local_to_bytes(api: &dyn Api, addr: &Addr) -> StdResult<Vec<u8>> {
    Ok(api.addr_canonicalize(addr.as_str())?.to_vec())
}

/// Recover a local account from canonical payload bytes.
pub fn local_from_bytes(api: &dyn Api, bytes: &[u8]) -> StdResult<Addr> {
    if bytes.is_empty() {
        return Err(StdError::generic_err("Empty local address"));
    }
    api.addr_humanize(&CanonicalAddr::from(bytes))
}
