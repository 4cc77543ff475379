//! Single-flight guard for credential refresh.
//!
//! Without coordination, concurrent requests that all hit an expired
//! credential each run their own refresh. A [`RefreshGate`] serializes
//! refreshes and lets a caller that arrived while one was running reuse that
//! refresh's outcome instead of starting another.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::refresh::RefreshError;

/// Outcome shared with every caller that waited on a refresh.
pub type SharedRefreshResult = Result<(), Arc<RefreshError>>;

#[derive(Debug, Default)]
struct GateState {
    last: Option<SharedRefreshResult>,
}

/// Collapses concurrent refreshes into one in-flight refresh.
#[derive(Debug, Default)]
pub struct RefreshGate {
    completed: AtomicU64,
    state: Mutex<GateState>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refreshes this gate has actually run.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Run `refresh` unless a refresh that finished after this call started
    /// already produced an outcome, in which case that outcome is returned.
    pub async fn run<F, Fut>(&self, refresh: F) -> SharedRefreshResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RefreshError>>,
    {
        let ticket = self.completed.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if self.completed.load(Ordering::Acquire) > ticket {
            if let Some(last) = &state.last {
                debug!("Reusing outcome of concurrent refresh");
                return last.clone();
            }
        }

        let outcome = refresh().await.map_err(Arc::new);
        state.last = Some(outcome.clone());
        self.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }
}
