//! Reward hook: pays out `hookAmount` as a loyalty/reward credit to a single
//! recipient, optionally tagged with a program identifier used by the hook
//! contract for bookkeeping. Conservation check: the declared reward amount
//! equals `hookAmount` exactly.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolValue};

use crate::errors::ErrorReason;

sol! {
    struct RewardHookData {
        address recipient;
        uint256 amount;
        bytes32 program_id;
    }
}

pub fn validate(hook_data: &[u8], hook_amount: U256) -> Result<(), ErrorReason> {
    let decoded = RewardHookData::abi_decode(hook_data).map_err(|_| ErrorReason::DecodingError)?;

    if decoded.recipient == Address::ZERO {
        return Err(ErrorReason::InvalidAddress);
    }
    if decoded.program_id == B256::ZERO {
        return Err(ErrorReason::DecodingError);
    }
    if decoded.amount != hook_amount {
        return Err(ErrorReason::InsufficientValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_must_equal_hook_amount() {
        let data = RewardHookData {
            recipient: Address::repeat_byte(4),
            amount: U256::from(50_000u64),
            program_id: B256::repeat_byte(1),
        };
        assert!(validate(&data.abi_encode(), U256::from(50_000u64)).is_ok());
        assert!(validate(&data.abi_encode(), U256::from(50_001u64)).is_err());
    }

    #[test]
    fn missing_program_id_is_rejected() {
        let data = RewardHookData {
            recipient: Address::repeat_byte(4),
            amount: U256::from(50_000u64),
            program_id: B256::ZERO,
        };
        assert!(validate(&data.abi_encode(), U256::from(50_000u64)).is_err());
    }
}
