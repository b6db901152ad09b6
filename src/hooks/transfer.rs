//! Transfer hook: the simplest built-in, splitting `hookAmount` across zero,
//! one, or many recipients.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolValue};

use super::validate_recipient_amount_conservation;
use crate::errors::ErrorReason;

sol! {
    struct TransferHookData {
        address[] recipients;
        uint256[] amounts;
    }
}

/// `hookData` is either empty — meaning "single transfer of the whole hook
/// amount to `default_recipient`" — or ABI-encoded `(address[], uint256[])`
/// subject to the conservation check.
pub fn validate(
    hook_data: &[u8],
    hook_amount: U256,
    default_recipient: Address,
) -> Result<(), ErrorReason> {
    if hook_data.is_empty() {
        if default_recipient == Address::ZERO {
            return Err(ErrorReason::InvalidAddress);
        }
        return Ok(());
    }

    let decoded =
        TransferHookData::abi_decode(hook_data).map_err(|_| ErrorReason::DecodingError)?;
    validate_recipient_amount_conservation(&decoded.recipients, &decoded.amounts, hook_amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hook_data_is_a_single_transfer() {
        assert!(validate(&[], U256::from(990_000u64), Address::repeat_byte(9)).is_ok());
    }

    #[test]
    fn empty_hook_data_without_recipient_is_rejected() {
        assert_eq!(
            validate(&[], U256::from(990_000u64), Address::ZERO).unwrap_err(),
            ErrorReason::InvalidAddress
        );
    }

    #[test]
    fn revenue_split_three_ways_passes() {
        let data = TransferHookData {
            recipients: vec![
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                Address::repeat_byte(3),
            ],
            amounts: vec![
                U256::from(693_000u64),
                U256::from(198_000u64),
                U256::from(99_000u64),
            ],
        };
        let encoded = data.abi_encode();
        assert!(validate(&encoded, U256::from(990_000u64), Address::ZERO).is_ok());
    }

    #[test]
    fn sum_mismatch_is_rejected() {
        let data = TransferHookData {
            recipients: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            amounts: vec![U256::from(500_000u64), U256::from(400_000u64)],
        };
        let encoded = data.abi_encode();
        let err = validate(&encoded, U256::from(990_000u64), Address::ZERO).unwrap_err();
        assert_eq!(err, ErrorReason::InsufficientValue);
    }

    #[test]
    fn zero_address_recipient_is_rejected() {
        let data = TransferHookData {
            recipients: vec![Address::ZERO],
            amounts: vec![U256::from(990_000u64)],
        };
        let encoded = data.abi_encode();
        let err = validate(&encoded, U256::from(990_000u64), Address::ZERO).unwrap_err();
        assert_eq!(err, ErrorReason::InvalidAddress);
    }

    #[test]
    fn mismatched_array_lengths_are_rejected() {
        let data = TransferHookData {
            recipients: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            amounts: vec![U256::from(990_000u64)],
        };
        let encoded = data.abi_encode();
        assert!(validate(&encoded, U256::from(990_000u64), Address::ZERO).is_err());
    }
}
