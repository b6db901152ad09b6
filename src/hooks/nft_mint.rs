//! NFT mint hook: the hook amount is the total mint price paid for a batch
//! of tokens minted to one recipient. Conservation check: `pricePerToken *
//! quantity == hookAmount`.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolValue};

use crate::errors::ErrorReason;

sol! {
    struct NftMintHookData {
        address recipient;
        uint256 quantity;
        uint256 price_per_token;
    }
}

pub fn validate(hook_data: &[u8], hook_amount: U256) -> Result<(), ErrorReason> {
    let decoded = NftMintHookData::abi_decode(hook_data).map_err(|_| ErrorReason::DecodingError)?;

    if decoded.recipient == Address::ZERO {
        return Err(ErrorReason::InvalidAddress);
    }
    if decoded.quantity.is_zero() {
        return Err(ErrorReason::DecodingError);
    }

    let total = decoded
        .price_per_token
        .checked_mul(decoded.quantity)
        .ok_or(ErrorReason::DecodingError)?;
    if total != hook_amount {
        return Err(ErrorReason::InsufficientValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_times_price_must_equal_hook_amount() {
        let data = NftMintHookData {
            recipient: Address::repeat_byte(7),
            quantity: U256::from(3u64),
            price_per_token: U256::from(100_000u64),
        };
        assert!(validate(&data.abi_encode(), U256::from(300_000u64)).is_ok());
        assert!(validate(&data.abi_encode(), U256::from(299_999u64)).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let data = NftMintHookData {
            recipient: Address::repeat_byte(7),
            quantity: U256::ZERO,
            price_per_token: U256::from(100_000u64),
        };
        assert!(validate(&data.abi_encode(), U256::ZERO).is_err());
    }
}
