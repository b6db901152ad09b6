//! Account Pool (C7): the concurrency core. Each signing account is a
//! single-consumer queue with bounded depth; an account executes at most
//! one on-chain submission at a time, guaranteeing monotonic nonces without
//! an explicit nonce manager lock — the same invariant the teacher's
//! `PendingNonceManager` enforces with a per-address `Mutex`, but expressed
//! here as "only one task ever dequeues from this channel" rather than a
//! lock taken per call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::Address;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::errors::ErrorReason;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A unit of work dispatched to exactly one account's consumer task.
struct QueueItem<Output> {
    payer: Address,
    job: Box<dyn FnOnce() -> BoxFuture<Output> + Send>,
    reply: oneshot::Sender<Output>,
}

struct AccountHandle<Output> {
    address: Address,
    sender: mpsc::Sender<QueueItem<Output>>,
    in_flight_payers: Arc<DashMap<Address, ()>>,
}

/// A pool of signing accounts dedicated to one network. `Output` is whatever
/// the settlement engine's submit-and-await step returns (see
/// [`crate::settlement`]); keeping the pool generic over it avoids a
/// dependency cycle between this module and the settlement engine.
pub struct AccountPool<Output> {
    accounts: Vec<AccountHandle<Output>>,
    next: AtomicUsize,
}

impl<Output: Send + 'static> AccountPool<Output> {
    /// Spawns one dedicated consumer task per address and returns the pool.
    /// `max_queue_depth` bounds each account's channel; once full, enqueue
    /// attempts move on to the next account in round-robin order.
    pub fn new(addresses: Vec<Address>, max_queue_depth: usize, shutdown: CancellationToken) -> Self {
        let accounts = addresses
            .into_iter()
            .map(|address| {
                let (sender, mut receiver) = mpsc::channel::<QueueItem<Output>>(max_queue_depth);
                let in_flight_payers: Arc<DashMap<Address, ()>> = Arc::new(DashMap::new());
                let worker_payers = in_flight_payers.clone();
                let worker_shutdown = shutdown.clone();

                tokio::spawn(async move {
                    loop {
                        let item = tokio::select! {
                            biased;
                            item = receiver.recv() => item,
                            _ = worker_shutdown.cancelled() => {
                                receiver.close();
                                // Drain whatever was already queued before we started
                                // cancelling, then stop. Dispatched work (this loop
                                // body, once an item is taken) always runs to completion.
                                while let Ok(item) = receiver.try_recv() {
                                    worker_payers.remove(&item.payer);
                                    let _ = item.reply.send((item.job)().await);
                                }
                                break;
                            }
                        };
                        let Some(item) = item else { break };
                        let payer = item.payer;
                        let output = (item.job)().await;
                        worker_payers.remove(&payer);
                        let _ = item.reply.send(output);
                    }
                });

                AccountHandle {
                    address,
                    sender,
                    in_flight_payers,
                }
            })
            .collect();

        Self {
            accounts,
            next: AtomicUsize::new(0),
        }
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address).collect()
    }

    /// Enqueues `job` on the next account in round-robin order. Rejects with
    /// `DuplicatePayer` if that account already has work enqueued for
    /// `payer`; rejects with `QueueOverload` if every account's queue is
    /// full. Awaits the job's result once an account's consumer picks it up.
    pub async fn enqueue<F, Fut>(&self, payer: Address, job: F) -> Result<Output, ErrorReason>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Output> + Send + 'static,
    {
        if self.accounts.is_empty() {
            return Err(ErrorReason::QueueOverload);
        }
        let len = self.accounts.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;

        let selected = &self.accounts[start];
        if selected.in_flight_payers.contains_key(&payer) {
            return Err(ErrorReason::DuplicatePayer);
        }

        let mut boxed: Box<dyn FnOnce() -> BoxFuture<Output> + Send> =
            Box::new(move || Box::pin(job()));

        for offset in 0..len {
            let idx = (start + offset) % len;
            let account = &self.accounts[idx];
            let (reply_tx, reply_rx) = oneshot::channel();
            account.in_flight_payers.insert(payer, ());
            let item = QueueItem {
                payer,
                job: boxed,
                reply: reply_tx,
            };
            match account.sender.try_send(item) {
                Ok(()) => {
                    return reply_rx
                        .await
                        .map_err(|_| ErrorReason::UnexpectedError);
                }
                Err(mpsc::error::TrySendError::Full(item)) => {
                    account.in_flight_payers.remove(&payer);
                    boxed = item.job;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    account.in_flight_payers.remove(&payer);
                    return Err(ErrorReason::QueueOverload);
                }
            }
        }
        Err(ErrorReason::QueueOverload)
    }

    /// Enqueues `job` on the specific account matching `address`, bypassing
    /// round-robin selection. Used by fee claiming
    /// ([`crate::fee_claim`]), where a `claimFees` call must be submitted by
    /// the same account whose fees are being claimed rather than by whichever
    /// account round robin happens to pick. Blocks until that account's
    /// queue has room, so it also serializes with that account's settlement
    /// traffic in submission order.
    pub async fn enqueue_on<F, Fut>(&self, address: Address, job: F) -> Result<Output, ErrorReason>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Output> + Send + 'static,
    {
        let account = self
            .accounts
            .iter()
            .find(|a| a.address == address)
            .ok_or(ErrorReason::UnexpectedError)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let item = QueueItem {
            payer: address,
            job: Box::new(move || Box::pin(job())),
            reply: reply_tx,
        };
        account
            .sender
            .send(item)
            .await
            .map_err(|_| ErrorReason::QueueOverload)?;
        reply_rx.await.map_err(|_| ErrorReason::UnexpectedError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn enqueue_on_targets_the_named_account() {
        let token = CancellationToken::new();
        let pool: AccountPool<Address> = AccountPool::new(
            vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            4,
            token,
        );

        let result = pool
            .enqueue_on(Address::repeat_byte(2), || async { Address::repeat_byte(2) })
            .await
            .unwrap();
        assert_eq!(result, Address::repeat_byte(2));
    }

    #[tokio::test]
    async fn enqueue_on_unknown_address_is_unexpected_error() {
        let token = CancellationToken::new();
        let pool: AccountPool<()> = AccountPool::new(vec![Address::repeat_byte(1)], 4, token);
        let result = pool.enqueue_on(Address::repeat_byte(9), || async {}).await;
        assert_eq!(result, Err(ErrorReason::UnexpectedError));
    }
    use std::time::Duration;

    #[tokio::test]
    async fn round_robin_dispatches_across_accounts() {
        let token = CancellationToken::new();
        let pool: AccountPool<Address> = AccountPool::new(
            vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            4,
            token,
        );

        let addr = pool
            .enqueue(Address::repeat_byte(0xaa), move || async { Address::repeat_byte(1) })
            .await
            .unwrap();
        assert_eq!(addr, Address::repeat_byte(1));
    }

    #[tokio::test]
    async fn duplicate_payer_on_selected_account_is_rejected() {
        let token = CancellationToken::new();
        let pool: AccountPool<()> = AccountPool::new(vec![Address::repeat_byte(1)], 4, token);
        let payer = Address::repeat_byte(0xaa);

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let started = Arc::new(tokio::sync::Notify::new());
        let started_clone = started.clone();

        let pool = Arc::new(pool);
        let blocking_pool = pool.clone();
        let blocker = tokio::spawn(async move {
            blocking_pool
                .enqueue(payer, move || async move {
                    started_clone.notify_one();
                    let _ = release_rx.await;
                })
                .await
        });

        started.notified().await;
        let result = pool.enqueue(payer, || async {}).await;
        assert_eq!(result, Err(ErrorReason::DuplicatePayer));

        let _ = release_tx.send(());
        blocker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn queue_overload_when_every_account_is_full() {
        let token = CancellationToken::new();
        let pool: AccountPool<()> = AccountPool::new(vec![Address::repeat_byte(1)], 1, token);

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));
        let counter = Arc::new(AtomicU32::new(0));

        let pool = Arc::new(pool);
        let blocking_pool = pool.clone();
        let counter_clone = counter.clone();
        let release_rx_clone = release_rx.clone();
        let blocker = tokio::spawn(async move {
            blocking_pool
                .enqueue(Address::repeat_byte(1), move || async move {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                    let rx = release_rx_clone.lock().await.take().unwrap();
                    let _ = rx.await;
                })
                .await
        });

        // Give the worker a moment to dequeue the first item, occupying the
        // account's single slot with an in-flight job.
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Fill the one remaining queue slot with a second distinct payer, then
        // a third should overflow.
        let fill_pool = pool.clone();
        let filler = tokio::spawn(async move {
            fill_pool
                .enqueue(Address::repeat_byte(2), || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let overflow = pool.enqueue(Address::repeat_byte(3), || async {}).await;
        assert_eq!(overflow, Err(ErrorReason::QueueOverload));

        let _ = release_tx.send(());
        blocker.await.unwrap().unwrap();
        filler.await.unwrap().unwrap();
    }
}
