//! Dynamic Gas Price + Token Price caches (C5).
//!
//! Both caches expose a synchronous `get` that never blocks on RPC: a
//! background refresh task (spawned once at startup, cancelled via the
//! shared [`tokio_util::sync::CancellationToken`] from [`crate::util::SigDown`])
//! keeps the cache warm, and `get` falls back to a configured static value
//! when nothing has been fetched yet or refreshes have been failing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::TtlCache;
use crate::chain_id::ChainId;

/// Source of a network's current gas price, in wei. Implemented over an
/// `alloy` provider in production; swappable in tests.
pub trait GasPriceSource: Send + Sync + 'static {
    fn fetch_gas_price(
        &self,
        chain_id: ChainId,
    ) -> impl Future<Output = Result<u128, String>> + Send;
}

/// Source of a network's native-token USD price, e.g. via an oracle or
/// price-feed HTTP API.
pub trait TokenPriceSource: Send + Sync + 'static {
    fn fetch_token_price_usd(
        &self,
        chain_id: ChainId,
    ) -> impl Future<Output = Result<f64, String>> + Send;
}

/// Gas price cache: TTL 300s default, background refresh every 60s,
/// falling back to a configured static price per network on failure.
pub struct GasPriceCache {
    cache: TtlCache<ChainId, u128>,
    fallback: u128,
}

impl GasPriceCache {
    pub fn new(ttl: Duration, max_keys: usize, fallback_wei: u128) -> Self {
        Self {
            cache: TtlCache::new(ttl, max_keys),
            fallback: fallback_wei,
        }
    }

    /// Current gas price for `chain_id`, in wei. Never blocks.
    pub fn get(&self, chain_id: ChainId) -> u128 {
        self.cache.get(&chain_id).unwrap_or(self.fallback)
    }

    fn set(&self, chain_id: ChainId, price_wei: u128) {
        self.cache.insert(chain_id, price_wei);
    }

    /// Spawns the background refresh loop. Returns the join handle so the
    /// caller can await it during shutdown if desired (not required —
    /// cancellation alone stops it).
    pub fn spawn_refresher<S: GasPriceSource>(
        self: Arc<Self>,
        source: Arc<S>,
        chain_ids: Vec<ChainId>,
        refresh_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh_interval);
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = interval.tick() => {
                        for chain_id in &chain_ids {
                            match source.fetch_gas_price(*chain_id).await {
                                Ok(price) => self.set(*chain_id, price),
                                Err(err) => {
                                    tracing::warn!(%chain_id, error = %err, "gas price refresh failed, keeping cached value");
                                }
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Native-token USD price cache: TTL 3600s default, background refresh
/// every 600s.
pub struct TokenPriceCache {
    cache: TtlCache<ChainId, f64>,
    fallback_by_symbol: std::collections::HashMap<String, f64>,
}

impl TokenPriceCache {
    pub fn new(
        ttl: Duration,
        max_keys: usize,
        fallback_by_symbol: std::collections::HashMap<String, f64>,
    ) -> Self {
        Self {
            cache: TtlCache::new(ttl, max_keys),
            fallback_by_symbol,
        }
    }

    pub fn get(&self, chain_id: ChainId, native_symbol: &str) -> f64 {
        self.cache
            .get(&chain_id)
            .unwrap_or_else(|| self.fallback_by_symbol.get(native_symbol).copied().unwrap_or(0.0))
    }

    fn set(&self, chain_id: ChainId, price_usd: f64) {
        self.cache.insert(chain_id, price_usd);
    }

    pub fn spawn_refresher<S: TokenPriceSource>(
        self: Arc<Self>,
        source: Arc<S>,
        chain_ids: Vec<ChainId>,
        refresh_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh_interval);
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = interval.tick() => {
                        for chain_id in &chain_ids {
                            match source.fetch_token_price_usd(*chain_id).await {
                                Ok(price) => self.set(*chain_id, price),
                                Err(err) => {
                                    tracing::warn!(%chain_id, error = %err, "token price refresh failed, keeping cached value");
                                }
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_price_falls_back_when_cold() {
        let cache = GasPriceCache::new(Duration::from_secs(300), 100, 1_500_000_000);
        assert_eq!(cache.get(ChainId(84532)), 1_500_000_000);
    }

    #[test]
    fn token_price_falls_back_by_symbol() {
        let mut fallback = std::collections::HashMap::new();
        fallback.insert("ETH".to_string(), 3_000.0);
        let cache = TokenPriceCache::new(Duration::from_secs(3600), 100, fallback);
        assert_eq!(cache.get(ChainId(8453), "ETH"), 3_000.0);
        assert_eq!(cache.get(ChainId(8453), "MATIC"), 0.0);
    }

    #[tokio::test]
    async fn background_refresh_updates_cached_value() {
        struct FixedSource;
        impl GasPriceSource for FixedSource {
            async fn fetch_gas_price(&self, _chain_id: ChainId) -> Result<u128, String> {
                Ok(42)
            }
        }

        let cache = Arc::new(GasPriceCache::new(Duration::from_secs(300), 100, 1));
        let token = CancellationToken::new();
        let handle = cache.clone().spawn_refresher(
            Arc::new(FixedSource),
            vec![ChainId(84532)],
            Duration::from_millis(5),
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        let _ = handle.await;

        assert_eq!(cache.get(ChainId(84532)), 42);
    }
}
