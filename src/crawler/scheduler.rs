//! Request scheduling: per-host throttling and bounded worker pools
//!
//! This module handles:
//! - Serializing requests per destination host
//! - Enforcing a minimum interval between requests to the same host
//! - Running a fixed list of jobs on N concurrent workers while keeping
//!   results in input order

use crate::state::HostRateState;
use crate::url::host_key;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Throttles outbound requests per host
///
/// Each host gets its own async mutex around a [`HostRateState`]. The mutex
/// queue is the wait-chain: callers for the same host are released one at a
/// time, each no sooner than `min_interval` after the previous one. Requests
/// to different hosts never wait on each other.
#[derive(Debug)]
pub struct HostRateLimiter {
    min_interval: Duration,
    hosts: Mutex<HashMap<String, Arc<tokio::sync::Mutex<HostRateState>>>>,
}

impl HostRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn slot(&self, key: &str) -> Arc<tokio::sync::Mutex<HostRateState>> {
        let mut hosts = self
            .hosts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hosts
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(HostRateState::new())))
            .clone()
    }

    /// Waits until a request to the URL's host may be sent
    ///
    /// URLs without a host share one anonymous slot.
    pub async fn wait(&self, url: &str) {
        let key = host_key(url).unwrap_or_default();
        let slot = self.slot(&key);

        let mut state = slot.lock().await;
        if let Some(delay) = state.time_until_next_request(Instant::now()) {
            tracing::trace!("Throttling {} for {:?}", key, delay);
            tokio::time::sleep(delay).await;
        }
        state.record_request(Instant::now(), self.min_interval);
    }

    /// Number of requests released for a host so far
    ///
    /// Waits for a throttled request that currently holds the host's slot.
    pub async fn request_count(&self, host: &str) -> u32 {
        let slot = {
            let hosts = self
                .hosts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            hosts.get(host).cloned()
        };
        match slot {
            Some(slot) => slot.lock().await.request_count,
            None => 0,
        }
    }
}

/// Runs `worker` over `items` with at most `limit` in flight
///
/// Workers receive the item's index. The output vector is ordered by index
/// regardless of completion order.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, worker: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| worker(index, item))
        .buffered(limit.max(1))
        .collect()
        .await
}
