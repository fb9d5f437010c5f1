//! RLP payload helpers and bridge decimal conversion.
//!
//! Channel payloads are RLP lists. Integers are big-endian byte strings with
//! no leading zeros, symbols are right zero-padded 32-byte strings.

use cosmwasm_std::{Uint128, Uint256};
use rlp::{DecoderError, Rlp, RlpStream};

use crate::error::ContractError;
use crate::state::BRIDGE_DECIMALS;

pub type DecodeResult<T> = Result<T, DecoderError>;

// ============================================================================
// Decoding
// ============================================================================

fn data_item<'a>(rlp: &Rlp<'a>) -> DecodeResult<&'a [u8]> {
    if !rlp.is_data() {
        return Err(DecoderError::RlpExpectedToBeData);
    }
    rlp.data()
}

pub fn decode_uint256(rlp: &Rlp) -> DecodeResult<Uint256> {
    let data = data_item(rlp)?;
    if data.len() > 32 {
        return Err(DecoderError::Custom("integer wider than 256 bits"));
    }
    let mut buf = [0u8; 32];
    buf[32 - data.len()..].copy_from_slice(data);
    Ok(Uint256::from_be_bytes(buf))
}

pub fn decode_uint128(rlp: &Rlp) -> DecodeResult<Uint128> {
    let value = decode_uint256(rlp)?;
    Uint128::try_from(value).map_err(|_| DecoderError::Custom("integer wider than 128 bits"))
}

pub fn decode_u64(rlp: &Rlp) -> DecodeResult<u64> {
    let value = decode_uint256(rlp)?;
    let value =
        Uint128::try_from(value).map_err(|_| DecoderError::Custom("integer wider than 64 bits"))?;
    u64::try_from(value.u128()).map_err(|_| DecoderError::Custom("integer wider than 64 bits"))
}

pub fn decode_bytes(rlp: &Rlp) -> DecodeResult<Vec<u8>> {
    Ok(data_item(rlp)?.to_vec())
}

/// Decode a right zero-padded 32-byte symbol.
pub fn decode_symbol(rlp: &Rlp) -> DecodeResult<String> {
    let data = data_item(rlp)?;
    if data.len() != 32 {
        return Err(DecoderError::Custom("symbol must be 32 bytes"));
    }
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    if data[end..].iter().any(|b| *b != 0) {
        return Err(DecoderError::Custom("symbol has bytes after padding"));
    }
    String::from_utf8(data[..end].to_vec()).map_err(|_| DecoderError::Custom("symbol is not utf8"))
}

/// Decode a list item into a vector with `f`.
pub fn decode_list<T>(
    rlp: &Rlp,
    f: impl Fn(&Rlp) -> DecodeResult<T>,
) -> DecodeResult<Vec<T>> {
    if !rlp.is_list() {
        return Err(DecoderError::RlpExpectedToBeList);
    }
    rlp.iter().map(|item| f(&item)).collect()
}

/// Open `payload` as a list of exactly `fields` items.
pub fn open_list(payload: &[u8], fields: usize) -> DecodeResult<Rlp<'_>> {
    let rlp = Rlp::new(payload);
    if !rlp.is_list() {
        return Err(DecoderError::RlpExpectedToBeList);
    }
    if rlp.item_count()? != fields {
        return Err(DecoderError::RlpIncorrectListLen);
    }
    Ok(rlp)
}

// ============================================================================
// Encoding
// ============================================================================

/// Minimal big-endian bytes of an unsigned integer.
pub fn uint_bytes(value: Uint256) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

pub fn append_uint(stream: &mut RlpStream, value: impl Into<Uint256>) {
    stream.append(&uint_bytes(value.into()));
}

pub fn append_bytes(stream: &mut RlpStream, bytes: &[u8]) {
    stream.append(&bytes.to_vec());
}

/// Encode a symbol as a right zero-padded 32-byte string.
pub fn encode_symbol(symbol: &str) -> Result<[u8; 32], ContractError> {
    let raw = symbol.as_bytes();
    if raw.is_empty() || raw.len() > 32 {
        return Err(ContractError::InvalidAmount {
            reason: format!("symbol {} must be 1 to 32 bytes", symbol),
        });
    }
    let mut out = [0u8; 32];
    out[..raw.len()].copy_from_slice(raw);
    Ok(out)
}

// ============================================================================
// Decimal Conversion
// ============================================================================

fn pow10(exp: u8) -> Result<Uint128, ContractError> {
    10u128
        .checked_pow(exp as u32)
        .map(Uint128::new)
        .ok_or_else(|| ContractError::Overflow(format!("10^{} does not fit in 128 bits", exp)))
}

/// Smallest local amount that survives conversion to bridge decimals.
pub fn precision_unit(decimals: u8) -> Result<Uint128, ContractError> {
    if decimals > BRIDGE_DECIMALS {
        pow10(decimals - BRIDGE_DECIMALS)
    } else {
        Ok(Uint128::one())
    }
}

/// Convert a local amount to bridge decimals. Any remainder is an error.
pub fn to_bridge_amount(amount: Uint128, decimals: u8) -> Result<Uint128, ContractError> {
    if decimals > BRIDGE_DECIMALS {
        let unit = pow10(decimals - BRIDGE_DECIMALS)?;
        if !(amount % unit).is_zero() {
            return Err(ContractError::PrecisionLoss { amount, unit });
        }
        Ok(amount / unit)
    } else {
        Ok(amount.checked_mul(pow10(BRIDGE_DECIMALS - decimals)?)?)
    }
}

/// Convert an amount in bridge decimals back to local decimals.
pub fn from_bridge_amount(amount: Uint128, decimals: u8) -> Result<Uint128, ContractError> {
    if decimals >= BRIDGE_DECIMALS {
        Ok(amount.checked_mul(pow10(decimals - BRIDGE_DECIMALS)?)?)
    } else {
        let unit = pow10(BRIDGE_DECIMALS - decimals)?;
        if !(amount % unit).is_zero() {
            return Err(ContractError::PrecisionLoss { amount, unit });
        }
        Ok(amount / unit)
    }
}

/// Floor a local amount to bridge decimals in 256 bits, so scaling up a
/// low-decimal amount cannot overflow.
pub fn floor_to_bridge_wide(amount: Uint128, decimals: u8) -> Uint256 {
    let amount = Uint256::from(amount);
    if decimals > BRIDGE_DECIMALS {
        match Uint256::from(10u128).checked_pow((decimals - BRIDGE_DECIMALS) as u32) {
            Ok(unit) => amount / unit,
            Err(_) => Uint256::zero(),
        }
    } else {
        amount * Uint256::from(10u128.pow((BRIDGE_DECIMALS - decimals) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_roundtrip_through_rlp() {
        let mut stream = RlpStream::new_list(3);
        append_uint(&mut stream, Uint128::zero());
        append_uint(&mut stream, Uint128::new(1_000_000_000_000_000_000));
        append_uint(&mut stream, 42u64);
        let bytes = stream.out().to_vec();

        let rlp = open_list(&bytes, 3).unwrap();
        assert_eq!(decode_uint128(&rlp.at(0).unwrap()).unwrap(), Uint128::zero());
        assert_eq!(
            decode_uint128(&rlp.at(1).unwrap()).unwrap(),
            Uint128::new(1_000_000_000_000_000_000)
        );
        assert_eq!(decode_u64(&rlp.at(2).unwrap()).unwrap(), 42);
        assert!(open_list(&bytes, 2).is_err());
    }

    #[test]
    fn test_uint_bytes_is_minimal() {
        assert!(uint_bytes(Uint256::zero()).is_empty());
        assert_eq!(uint_bytes(Uint256::from(256u64)), vec![1, 0]);
    }

    #[test]
    fn test_symbol_padding() {
        let encoded = encode_symbol("BNB").unwrap();
        assert_eq!(&encoded[..3], b"BNB");
        assert!(encoded[3..].iter().all(|b| *b == 0));

        let mut stream = RlpStream::new_list(1);
        append_bytes(&mut stream, &encoded);
        let bytes = stream.out().to_vec();
        let rlp = open_list(&bytes, 1).unwrap();
        assert_eq!(decode_symbol(&rlp.at(0).unwrap()).unwrap(), "BNB");

        assert!(encode_symbol("").is_err());
        assert!(encode_symbol(&"X".repeat(33)).is_err());
    }

    #[test]
    fn test_bridge_amount_conversion() {
        // 18 decimals: unit is 1e10
        assert_eq!(precision_unit(18).unwrap(), Uint128::new(10_000_000_000));
        assert_eq!(
            to_bridge_amount(Uint128::new(1_000_000_000_000_000_000), 18).unwrap(),
            Uint128::new(100_000_000)
        );
        assert_eq!(
            to_bridge_amount(Uint128::new(10_000_000_001), 18).unwrap_err(),
            ContractError::PrecisionLoss {
                amount: Uint128::new(10_000_000_001),
                unit: Uint128::new(10_000_000_000),
            }
        );
        assert_eq!(
            from_bridge_amount(Uint128::new(100_000_000), 18).unwrap(),
            Uint128::new(1_000_000_000_000_000_000)
        );

        // 6 decimals scale up
        assert_eq!(precision_unit(6).unwrap(), Uint128::one());
        assert_eq!(
            to_bridge_amount(Uint128::new(1_000_000), 6).unwrap(),
            Uint128::new(100_000_000)
        );
        assert_eq!(
            from_bridge_amount(Uint128::new(100_000_000), 6).unwrap(),
            Uint128::new(1_000_000)
        );
    }

    #[test]
    fn test_wide_floor_never_overflows() {
        let max = Uint128::MAX;
        assert_eq!(
            floor_to_bridge_wide(max, 6),
            Uint256::from(max) * Uint256::from(100u128)
        );
        assert!(to_bridge_amount(max, 6).is_err());

        assert_eq!(
            floor_to_bridge_wide(Uint128::new(10_000_000_001), 18),
            Uint256::from(1u128)
        );
        assert_eq!(floor_to_bridge_wide(Uint128::new(5), 8), Uint256::from(5u128));
        assert!(floor_to_bridge_wide(max, 255).is_zero());
    }
}
