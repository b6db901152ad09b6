//! Revenue split hook: same recipient/amount shape as the transfer hook, but
//! expresses a standing split among several stakeholders (merchant, referrer,
//! platform) rather than a one-off transfer. Decoding and the conservation
//! check are identical; only the semantic label differs.

use alloy_primitives::U256;
use alloy_sol_types::SolValue;

use super::transfer::TransferHookData;
use super::validate_recipient_amount_conservation;
use crate::errors::ErrorReason;

/// `hookData` must be ABI-encoded `(address[] recipients, uint256[] amounts)`;
/// unlike the transfer hook, an empty payload has no sensible default split
/// and is rejected.
pub fn validate(hook_data: &[u8], hook_amount: U256) -> Result<(), ErrorReason> {
    if hook_data.is_empty() {
        return Err(ErrorReason::DecodingError);
    }
    let decoded =
        TransferHookData::abi_decode(hook_data).map_err(|_| ErrorReason::DecodingError)?;
    validate_recipient_amount_conservation(&decoded.recipients, &decoded.amounts, hook_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    #[test]
    fn empty_hook_data_is_rejected() {
        assert_eq!(
            validate(&[], U256::from(990_000u64)).unwrap_err(),
            ErrorReason::DecodingError
        );
    }

    #[test]
    fn valid_split_passes() {
        let data = TransferHookData {
            recipients: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            amounts: vec![U256::from(700_000u64), U256::from(290_000u64)],
        };
        assert!(validate(&data.abi_encode(), U256::from(990_000u64)).is_ok());
    }
}
