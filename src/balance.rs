//! Balance Checker (C6): queries ERC-20 `balanceOf` with a short TTL cache.
//! Called both during verification (§4.8 step 9) and defensively again
//! during settlement, since balance can change between the two.

use std::future::Future;
use std::time::Duration;

use alloy_primitives::{Address, U256};

use crate::cache::TtlCache;

/// Source of a payer's on-chain token balance. Implemented over `alloy`'s
/// ERC-20 `balanceOf` binding ([`crate::erc20_abi::Erc20`]) in production.
pub trait BalanceSource: Send + Sync + 'static {
    fn fetch_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> impl Future<Output = Result<U256, String>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCheckResult {
    pub has_sufficient: bool,
    pub balance: U256,
    pub required: U256,
    pub cached: bool,
}

pub struct BalanceChecker {
    cache: TtlCache<(Address, Address), U256>,
}

impl BalanceChecker {
    pub fn new(ttl: Duration, max_keys: usize) -> Self {
        Self {
            cache: TtlCache::new(ttl, max_keys),
        }
    }

    pub async fn check<S: BalanceSource>(
        &self,
        source: &S,
        token: Address,
        owner: Address,
        required: U256,
    ) -> Result<BalanceCheckResult, String> {
        let key = (token, owner);
        if let Some(balance) = self.cache.get(&key) {
            return Ok(BalanceCheckResult {
                has_sufficient: balance >= required,
                balance,
                required,
                cached: true,
            });
        }

        let balance = source.fetch_balance(token, owner).await?;
        self.cache.insert(key, balance);
        Ok(BalanceCheckResult {
            has_sufficient: balance >= required,
            balance,
            required,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBalance(U256);
    impl BalanceSource for FixedBalance {
        async fn fetch_balance(&self, _token: Address, _owner: Address) -> Result<U256, String> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn sufficient_balance_passes() {
        let checker = BalanceChecker::new(Duration::from_secs(10), 100);
        let source = FixedBalance(U256::from(1_000_000u64));
        let result = checker
            .check(
                &source,
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                U256::from(1_000_000u64),
            )
            .await
            .unwrap();
        assert!(result.has_sufficient);
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn insufficient_balance_is_reported() {
        let checker = BalanceChecker::new(Duration::from_secs(10), 100);
        let source = FixedBalance(U256::from(500u64));
        let result = checker
            .check(
                &source,
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                U256::from(1_000u64),
            )
            .await
            .unwrap();
        assert!(!result.has_sufficient);
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_is_cached() {
        let checker = BalanceChecker::new(Duration::from_secs(60), 100);
        let source = FixedBalance(U256::from(1_000u64));
        let token = Address::repeat_byte(1);
        let owner = Address::repeat_byte(2);

        let first = checker
            .check(&source, token, owner, U256::from(1u64))
            .await
            .unwrap();
        let second = checker
            .check(&source, token, owner, U256::from(1u64))
            .await
            .unwrap();
        assert!(!first.cached);
        assert!(second.cached);
    }
}
