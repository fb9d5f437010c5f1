//! Package envelope codec.
//!
//! Every cross-chain package starts with a fixed 33 byte prefix:
//!
//! ```text
//! | type (1) | relay fee, uint256 big-endian (32) | payload (n) |
//! ```
//!
//! Ack and FailAck packages carry a zero relay fee.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::Uint256;
use thiserror::Error;

use crate::channel::ChannelId;

/// Length of the type tag plus the relay fee.
pub const PACKAGE_PREFIX_LEN: usize = 33;

/// Length of the key a package is committed under on the source chain.
pub const PACKAGE_KEY_LEN: usize = 14;

#[derive(Error, Debug, PartialEq)]
pub enum PackageError {
    #[error("Package too short: expected at least {expected} bytes, got {got}")]
    TooShort { expected: usize, got: usize },

    #[error("Unknown package type: {0}")]
    UnknownType(u8),
}

#[cw_serde]
#[derive(Copy, Eq)]
pub enum PackageType {
    Sync,
    Ack,
    FailAck,
}

impl PackageType {
    pub fn as_byte(self) -> u8 {
        match self {
            PackageType::Sync => 0x00,
            PackageType::Ack => 0x01,
            PackageType::FailAck => 0x02,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageType::Sync => "sync",
            PackageType::Ack => "ack",
            PackageType::FailAck => "fail_ack",
        }
    }
}

impl TryFrom<u8> for PackageType {
    type Error = PackageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PackageType::Sync),
            0x01 => Ok(PackageType::Ack),
            0x02 => Ok(PackageType::FailAck),
            other => Err(PackageError::UnknownType(other)),
        }
    }
}

/// A decoded package envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub package_type: PackageType,
    /// Relay fee, always zero for acks.
    pub relay_fee: Uint256,
    pub payload: Vec<u8>,
}

impl Package {
    pub fn sync(relay_fee: Uint256, payload: Vec<u8>) -> Self {
        Self {
            package_type: PackageType::Sync,
            relay_fee,
            payload,
        }
    }

    pub fn ack(payload: Vec<u8>) -> Self {
        Self {
            package_type: PackageType::Ack,
            relay_fee: Uint256::zero(),
            payload,
        }
    }

    pub fn fail_ack(payload: Vec<u8>) -> Self {
        Self {
            package_type: PackageType::FailAck,
            relay_fee: Uint256::zero(),
            payload,
        }
    }

    /// Serialize into the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PACKAGE_PREFIX_LEN + self.payload.len());
        out.push(self.package_type.as_byte());
        let fee = match self.package_type {
            PackageType::Sync => self.relay_fee,
            PackageType::Ack | PackageType::FailAck => Uint256::zero(),
        };
        out.extend_from_slice(&fee.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse the wire format. The relay fee of acks is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, PackageError> {
        if bytes.len() < PACKAGE_PREFIX_LEN {
            return Err(PackageError::TooShort {
                expected: PACKAGE_PREFIX_LEN,
                got: bytes.len(),
            });
        }

        let package_type = PackageType::try_from(bytes[0])?;
        let relay_fee = match package_type {
            PackageType::Sync => {
                let mut fee = [0u8; 32];
                fee.copy_from_slice(&bytes[1..PACKAGE_PREFIX_LEN]);
                Uint256::from_be_bytes(fee)
            }
            PackageType::Ack | PackageType::FailAck => Uint256::zero(),
        };

        Ok(Self {
            package_type,
            relay_fee,
            payload: bytes[PACKAGE_PREFIX_LEN..].to_vec(),
        })
    }
}

/// Storage key a package is committed under on the source chain:
///
/// ```text
/// | 0x00 | src chain id (2) | dest chain id (2) | channel (1) | sequence (8) |
/// ```
pub fn package_key(
    src_chain_id: u16,
    dest_chain_id: u16,
    channel_id: ChannelId,
    sequence: u64,
) -> [u8; PACKAGE_KEY_LEN] {
    let mut key = [0u8; PACKAGE_KEY_LEN];
    key[1..3].copy_from_slice(&src_chain_id.to_be_bytes());
    key[3..5].copy_from_slice(&dest_chain_id.to_be_bytes());
    key[5] = channel_id;
    key[6..14].copy_from_slice(&sequence.to_be_bytes());
    key
}
