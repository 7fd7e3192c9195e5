//! Consumed-nonce registry
//!
//! Process-wide record of challenge nonces that have already been accepted
//! or abandoned. Writes are serialised behind a single lock, so two
//! validations racing on the same nonce can never both succeed.
//!
//! Entries older than the retention period can be pruned; a pruned nonce is
//! already rejected by the freshness check, so pruning only bounds memory.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::Nonce;

/// Registry statistics
#[derive(Default)]
pub struct NonceStats {
    recorded: AtomicU64,
    replays: AtomicU64,
    pruned: AtomicU64,
}

impl NonceStats {
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn replays(&self) -> u64 {
        self.replays.load(Ordering::Relaxed)
    }

    pub fn pruned(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }
}

/// Set of consumed nonces with time-bounded retention
pub struct NonceRegistry {
    retention: Duration,
    entries: RwLock<HashMap<Nonce, Instant>>,
    stats: NonceStats,
}

impl NonceRegistry {
    /// Create a registry that keeps entries for at least `retention`
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            entries: RwLock::new(HashMap::new()),
            stats: NonceStats::default(),
        }
    }

    /// Mark `nonce` consumed.
    ///
    /// Returns `false` if it was already recorded.
    pub async fn record(&self, nonce: &Nonce) -> bool {
        let mut entries = self.entries.write().await;

        if entries.contains_key(nonce) {
            self.stats.replays.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        entries.insert(nonce.clone(), Instant::now());
        self.stats.recorded.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Mark `nonce` consumed without counting an existing entry as a replay.
    ///
    /// Used for challenges whose handshake ended without a validated
    /// response, so the nonce can never be accepted later.
    pub async fn retire(&self, nonce: &Nonce) {
        let mut entries = self.entries.write().await;
        if let Entry::Vacant(slot) = entries.entry(nonce.clone()) {
            slot.insert(Instant::now());
            self.stats.recorded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn contains(&self, nonce: &Nonce) -> bool {
        self.entries.read().await.contains_key(nonce)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn stats(&self) -> &NonceStats {
        &self.stats
    }

    /// Remove entries older than the retention period
    pub async fn prune_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();

        entries.retain(|_, recorded_at| now.duration_since(*recorded_at) <= self.retention);

        let removed = before - entries.len();
        self.stats
            .pruned
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Spawn a background sweep that prunes on `interval` until `shutdown`
    /// flips to true or its sender is dropped
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = registry.prune_expired().await;
                        if removed > 0 {
                            debug!(removed, "Pruned expired nonces");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Nonce sweeper stopped");
        })
    }
}
