use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Latest-call-wins debounce for search input.
#[derive(Debug, Default, Clone)]
pub struct Debouncer {
    latest: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits `delay`, then reports whether this is still the most recent call.
    pub async fn settle(&self, delay: Duration) -> bool {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        self.latest.load(Ordering::SeqCst) == ticket
    }
}
