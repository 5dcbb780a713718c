//! Constructor argument encoding and decoding of revert payloads.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, I256, U256};
use alloy::sol_types::{Panic, Revert, SolError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ConstructorArg {
    Address(Address),
    Uint8(u8),
    Uint256(U256),
    Int256(I256),
}

impl ConstructorArg {
    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            ConstructorArg::Address(addr) => DynSolValue::Address(*addr),
            ConstructorArg::Uint8(v) => DynSolValue::Uint(U256::from(*v), 8),
            ConstructorArg::Uint256(v) => DynSolValue::Uint(*v, 256),
            ConstructorArg::Int256(v) => DynSolValue::Int(*v, 256),
        }
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstructorArg::Address(a) => write!(f, "{}", a),
            ConstructorArg::Uint8(v) => write!(f, "{}", v),
            ConstructorArg::Uint256(v) => write!(f, "{}", v),
            ConstructorArg::Int256(v) => write!(f, "{}", v),
        }
    }
}

/// ABI encoding of `args` as a parameter list.
pub fn encode_args(args: &[ConstructorArg]) -> Vec<u8> {
    let values = args.iter().map(ConstructorArg::to_sol_value).collect();
    DynSolValue::Tuple(values).abi_encode_params()
}

/// Appends the ABI-encoded constructor arguments to the creation bytecode.
pub fn encode_creation(bytecode: &[u8], args: &[ConstructorArg]) -> Vec<u8> {
    let mut data = bytecode.to_vec();
    data.extend(encode_args(args));
    data
}

/// Selector of a parameterless custom error such as `FundMe__NotOwner()`.
pub fn error_selector(name: &str) -> [u8; 4] {
    let hash = keccak256(format!("{}()", name));
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Turns revert data into a human readable reason.
///
/// `Error(string)` payloads yield their message and custom errors listed in
/// `known_errors` yield their name. Compiler panics are reported with their
/// code, anything else as hex.
pub fn decode_revert_reason(data: &[u8], known_errors: &[&str]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    if let Ok(revert) = Revert::abi_decode(data) {
        return Some(revert.reason);
    }
    let selector = &data[..4];
    if let Some(name) = known_errors.iter().find(|name| selector == error_selector(name)) {
        return Some((*name).to_string());
    }
    if let Ok(panic) = Panic::abi_decode(data) {
        return Some(format!("panic code {:#x}", panic.code));
    }
    Some(format!("0x{}", hex::encode(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_address_argument_is_left_padded() {
        let addr = Address::repeat_byte(0x11);
        let data = encode_creation(&[0x60, 0x80], &[ConstructorArg::Address(addr)]);
        assert_eq!(data.len(), 2 + 32);
        assert_eq!(&data[..2], &[0x60, 0x80]);
        assert_eq!(&data[2..14], &[0u8; 12]);
        assert_eq!(&data[14..], &[0x11; 20]);
    }

    #[test]
    fn test_mock_constructor_encoding() {
        let answer = I256::try_from(200_000_000_000i64).unwrap();
        let data = encode_args(&[ConstructorArg::Uint8(8), ConstructorArg::Int256(answer)]);
        assert_eq!(data.len(), 64);
        assert_eq!(data[31], 8);
        assert_eq!(
            U256::from_be_slice(&data[32..64]),
            U256::from(200_000_000_000u64)
        );
    }

    #[test]
    fn test_negative_int256_is_twos_complement() {
        let data = encode_args(&[ConstructorArg::Int256(I256::MINUS_ONE)]);
        assert_eq!(data, vec![0xff; 32]);
    }

    #[test]
    fn test_arguments_serialize_with_type_tags() {
        let args = vec![
            ConstructorArg::Address(address!("694AA1769357215DE4FAC081bf1f309aDC325306")),
            ConstructorArg::Uint8(8),
            ConstructorArg::Int256(I256::try_from(-5i64).unwrap()),
        ];
        let json = serde_json::to_string(&args).unwrap();
        assert!(json.contains(r#""type":"uint8","value":8"#));
        let back: Vec<ConstructorArg> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_decode_error_string_reason() {
        let data = Revert {
            reason: "Didn't semd enough..!!".to_string(),
        }
        .abi_encode();
        assert_eq!(
            decode_revert_reason(&data, &[]).as_deref(),
            Some("Didn't semd enough..!!")
        );
    }

    #[test]
    fn test_decode_custom_error_reason() {
        let data = error_selector("FundMe__NotOwner").to_vec();
        assert_eq!(
            decode_revert_reason(&data, &["FundMe__NotOwner"]).as_deref(),
            Some("FundMe__NotOwner")
        );
        assert_eq!(
            decode_revert_reason(&data, &[]),
            Some(format!("0x{}", hex::encode(&data)))
        );
        assert_eq!(decode_revert_reason(&[], &["FundMe__NotOwner"]), None);
    }

    #[test]
    fn test_decode_panic_reason() {
        let data = Panic {
            code: U256::from(0x32),
        }
        .abi_encode();
        assert_eq!(
            decode_revert_reason(&data, &["FundMe__NotOwner"]).as_deref(),
            Some("panic code 0x32")
        );
    }
}
