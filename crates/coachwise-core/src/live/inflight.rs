// Per-domain deduplication of in-flight refreshes.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::gateway::FetchError;

/// Result of one refresh as seen by every caller that waited on it.
pub type RefreshOutcome = Result<(), FetchError>;

pub(crate) type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Slot holding the refresh currently running for one domain, if any.
#[derive(Default)]
pub(crate) struct InFlight {
    slot: Mutex<Option<PendingRefresh>>,
}

impl InFlight {
    /// Hand back the pending refresh, starting one with `start` when nothing
    /// is pending. The flag is `true` when an existing refresh was joined.
    ///
    /// A started refresh is also driven on its own task, so it runs to
    /// completion even if every caller stops waiting. It must call
    /// [`InFlight::clear`] once its outcome is published.
    pub(crate) async fn join_or_start<F>(&self, start: F) -> (PendingRefresh, bool)
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(pending) = slot.as_ref() {
            return (pending.clone(), true);
        }

        let pending = start().shared();
        *slot = Some(pending.clone());
        tokio::spawn(pending.clone());
        (pending, false)
    }

    pub(crate) async fn clear(&self) {
        self.slot.lock().await.take();
    }

    pub(crate) async fn is_pending(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn second_caller_joins_pending_refresh() {
        let flight = Arc::new(InFlight::default());
        let starts = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let start = |flight: Arc<InFlight>, starts: Arc<AtomicUsize>, release: Arc<Notify>| {
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    release.notified().await;
                    flight.clear().await;
                    Ok(())
                }
                .boxed()
            }
        };

        let (first, joined_first) = flight
            .join_or_start(start(flight.clone(), starts.clone(), release.clone()))
            .await;
        let (second, joined_second) = flight
            .join_or_start(start(flight.clone(), starts.clone(), release.clone()))
            .await;

        assert!(!joined_first);
        assert!(joined_second);
        assert!(flight.is_pending().await);

        release.notify_one();
        assert_eq!(first.await, Ok(()));
        assert_eq!(second.await, Ok(()));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!flight.is_pending().await);
    }

    #[tokio::test]
    async fn refresh_completes_without_any_waiter() {
        let flight = Arc::new(InFlight::default());
        let done = Arc::new(Notify::new());

        let task_flight = flight.clone();
        let task_done = done.clone();
        let (pending, _) = flight
            .join_or_start(move || {
                async move {
                    task_flight.clear().await;
                    task_done.notify_one();
                    Err(FetchError::Timeout)
                }
                .boxed()
            })
            .await;
        drop(pending);

        done.notified().await;
        assert!(!flight.is_pending().await);
    }
}
