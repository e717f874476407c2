//! Cancellation scope owned by a screen.
//!
//! Every network call runs inside the scope of the screen that issued it. When
//! the screen is torn down its scope is cancelled and pending calls resolve to
//! [`FetchError::Cancelled`] instead of writing into retired state.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct Scope {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Scope::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Runs `fut` until it completes or the scope is cancelled.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        if self.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(FetchError::Cancelled),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_aborts_pending_work() {
        let scope = Scope::new();
        let task_scope = scope.clone();
        let handle = tokio::spawn(async move {
            task_scope
                .run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok::<_, FetchError>(1)
                })
                .await
        });
        tokio::task::yield_now().await;
        scope.cancel();
        let res = handle.await.unwrap();
        assert!(matches!(res, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn completed_work_passes_through() {
        let scope = Scope::new();
        let res = scope.run(async { Ok::<_, FetchError>(7) }).await.unwrap();
        assert_eq!(res, 7);
    }

    #[tokio::test]
    async fn already_cancelled_scope_short_circuits() {
        let scope = Scope::new();
        scope.cancel();
        assert!(scope.is_cancelled());
        let res = scope.run(async { Ok::<_, FetchError>(()) }).await;
        assert!(matches!(res, Err(FetchError::Cancelled)));
    }
}
