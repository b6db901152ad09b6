//! Commitment Calculator (C2): a pure, deterministic `keccak256` digest over
//! packed settlement parameters that must bit-exact match the on-chain
//! router's own packing. This is the anti-tampering hinge of the whole
//! protocol — it becomes the EIP-3009 nonce, so any deviation in packing
//! order here is a consensus bug, not a style choice.

use alloy_primitives::{keccak256, Address, B256, U256};

/// Fixed ASCII protocol tag prefixing every commitment, pinning the packing
/// format to one protocol version so a future v2 encoding cannot collide.
pub const PROTOCOL_TAG: &[u8] = b"X402/settle/v1";

/// All inputs to the commitment digest, matching `extra`'s settlement fields
/// plus the authorization's `from`/`value`/timing.
#[derive(Debug, Clone)]
pub struct CommitmentParams {
    pub chain_id: u64,
    pub router: Address,
    pub asset: Address,
    pub from: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub salt: B256,
    pub pay_to: Address,
    pub facilitator_fee: U256,
    pub hook: Address,
    pub hook_data: Vec<u8>,
}

/// Computes the commitment digest. Packing order must exactly match the
/// on-chain `SettlementRouter`: protocol tag, chainId, router, asset, from,
/// value, validAfter, validBefore, salt, final payTo, facilitatorFee, hook,
/// `keccak256(hookData)`.
pub fn compute_commitment(params: &CommitmentParams) -> B256 {
    let mut buf = Vec::with_capacity(
        PROTOCOL_TAG.len() + 32 + 20 * 4 + 32 * 4 + 32 + 32,
    );
    buf.extend_from_slice(PROTOCOL_TAG);
    buf.extend_from_slice(&U256::from(params.chain_id).to_be_bytes::<32>());
    buf.extend_from_slice(params.router.as_slice());
    buf.extend_from_slice(params.asset.as_slice());
    buf.extend_from_slice(params.from.as_slice());
    buf.extend_from_slice(&params.value.to_be_bytes::<32>());
    buf.extend_from_slice(&params.valid_after.to_be_bytes::<32>());
    buf.extend_from_slice(&params.valid_before.to_be_bytes::<32>());
    buf.extend_from_slice(params.salt.as_slice());
    buf.extend_from_slice(params.pay_to.as_slice());
    buf.extend_from_slice(&params.facilitator_fee.to_be_bytes::<32>());
    buf.extend_from_slice(params.hook.as_slice());
    buf.extend_from_slice(keccak256(&params.hook_data).as_slice());

    keccak256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn base_params() -> CommitmentParams {
        CommitmentParams {
            chain_id: 84532,
            router: Address::from_str("0x1111111111111111111111111111111111111111").unwrap(),
            asset: Address::from_str("0x2222222222222222222222222222222222222222").unwrap(),
            from: Address::from_str("0x3333333333333333333333333333333333333333").unwrap(),
            value: U256::from(1_000_000u64),
            valid_after: U256::from(0u64),
            valid_before: U256::from(9_999_999_999u64),
            salt: B256::repeat_byte(0x42),
            pay_to: Address::from_str("0x4444444444444444444444444444444444444444").unwrap(),
            facilitator_fee: U256::from(10_000u64),
            hook: Address::from_str("0x5555555555555555555555555555555555555555").unwrap(),
            hook_data: vec![],
        }
    }

    #[test]
    fn is_deterministic() {
        let params = base_params();
        assert_eq!(compute_commitment(&params), compute_commitment(&params));
    }

    #[test]
    fn single_field_change_changes_digest() {
        let original = compute_commitment(&base_params());

        let mut tampered = base_params();
        tampered.facilitator_fee = U256::from(1u64);
        assert_ne!(original, compute_commitment(&tampered));

        let mut tampered = base_params();
        tampered.value = tampered.value + U256::from(1u64);
        assert_ne!(original, compute_commitment(&tampered));

        let mut tampered = base_params();
        tampered.salt = B256::repeat_byte(0x43);
        assert_ne!(original, compute_commitment(&tampered));
    }

    #[test]
    fn hook_data_is_hashed_not_inlined() {
        let mut a = base_params();
        a.hook_data = vec![1, 2, 3];
        let mut b = base_params();
        b.hook_data = vec![4, 5, 6];
        assert_ne!(compute_commitment(&a), compute_commitment(&b));
    }

    #[test]
    fn empty_and_nonempty_hook_data_differ() {
        let empty = base_params();
        let mut nonempty = base_params();
        nonempty.hook_data = vec![0];
        assert_ne!(compute_commitment(&empty), compute_commitment(&nonempty));
    }
}
