//! Hook Validator Registry (C3): decodes and semantically validates
//! `hookData` for each built-in hook type before a settlement is allowed to
//! reach gas estimation or submission.
//!
//! Per the design notes, hook validators are a small tagged sum type rather
//! than an open trait-object registry, because the built-in set is fixed;
//! unknown (custom) hook addresses are not validated here at all — they are
//! deferred to gas estimation's simulation path (§4.4).

pub mod nft_mint;
pub mod reward;
pub mod revenue_split;
pub mod transfer;

use alloy_primitives::{Address, U256};

use crate::errors::ErrorReason;
use crate::network::BuiltinHookKind;

/// Outcome of validating one hook invocation, mirroring the wire shape
/// `{isValid, errorReason?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookValidationOutcome {
    pub is_valid: bool,
    pub error_reason: Option<ErrorReason>,
}

impl HookValidationOutcome {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            error_reason: None,
        }
    }

    pub fn reject(reason: ErrorReason) -> Self {
        Self {
            is_valid: false,
            error_reason: Some(reason),
        }
    }
}

impl From<Result<(), ErrorReason>> for HookValidationOutcome {
    fn from(result: Result<(), ErrorReason>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(reason) => Self::reject(reason),
        }
    }
}

/// Validates `hookData` against `hookAmount` for a configured built-in hook.
/// `hook_address` is only used to decide whether the call is even directed
/// at one of this network's registered built-in addresses; the actual
/// decode/validate dispatch is by `kind`.
pub fn validate_builtin_hook(
    kind: BuiltinHookKind,
    hook_address: Address,
    builtin_addresses: &std::collections::HashMap<BuiltinHookKind, Address>,
    hook_data: &[u8],
    hook_amount: U256,
    default_recipient: Address,
) -> HookValidationOutcome {
    match builtin_addresses.get(&kind) {
        Some(configured) if *configured == hook_address => {}
        _ => return HookValidationOutcome::reject(ErrorReason::HookNotAllowed),
    }

    let result = match kind {
        BuiltinHookKind::Transfer => {
            transfer::validate(hook_data, hook_amount, default_recipient)
        }
        BuiltinHookKind::RevenueSplit => revenue_split::validate(hook_data, hook_amount),
        BuiltinHookKind::NftMint => nft_mint::validate(hook_data, hook_amount),
        BuiltinHookKind::Reward => reward::validate(hook_data, hook_amount),
    };
    result.into()
}

/// Shared conservation check: array lengths match, are non-empty, every
/// recipient is a well-formed non-zero address, every amount is strictly
/// positive, and the amounts sum exactly to `hook_amount`.
pub(crate) fn validate_recipient_amount_conservation(
    recipients: &[Address],
    amounts: &[U256],
    hook_amount: U256,
) -> Result<(), ErrorReason> {
    if recipients.len() != amounts.len() {
        return Err(ErrorReason::DecodingError);
    }
    if recipients.is_empty() {
        return Err(ErrorReason::DecodingError);
    }
    let mut sum = U256::ZERO;
    for (recipient, amount) in recipients.iter().zip(amounts.iter()) {
        if *recipient == Address::ZERO {
            return Err(ErrorReason::InvalidAddress);
        }
        if amount.is_zero() {
            return Err(ErrorReason::DecodingError);
        }
        sum = sum
            .checked_add(*amount)
            .ok_or(ErrorReason::DecodingError)?;
    }
    if sum != hook_amount {
        return Err(ErrorReason::InsufficientValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_hook_address_not_in_whitelist() {
        let mut builtins = std::collections::HashMap::new();
        builtins.insert(BuiltinHookKind::Transfer, Address::repeat_byte(1));

        let outcome = validate_builtin_hook(
            BuiltinHookKind::Transfer,
            Address::repeat_byte(2),
            &builtins,
            &[],
            U256::from(1_000_000u64),
            Address::repeat_byte(3),
        );
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error_reason, Some(ErrorReason::HookNotAllowed));
    }

    #[test]
    fn conservation_check_rejects_mismatched_sum() {
        let recipients = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        let amounts = vec![U256::from(500_000u64), U256::from(400_000u64)];
        let err = validate_recipient_amount_conservation(
            &recipients,
            &amounts,
            U256::from(990_000u64),
        )
        .unwrap_err();
        assert_eq!(err, ErrorReason::InsufficientValue);
    }

    #[test]
    fn conservation_check_accepts_exact_sum() {
        let recipients = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        let amounts = vec![U256::from(693_000u64), U256::from(297_000u64)];
        assert!(
            validate_recipient_amount_conservation(&recipients, &amounts, U256::from(990_000u64))
                .is_ok()
        );
    }
}
