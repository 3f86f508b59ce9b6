//! Debounced city suggestions for the search box.
//!
//! Each keystroke calls [`SuggestionService::on_input`]. A lookup only goes
//! out once the input has been quiet for the debounce period, and any newer
//! input cancels the pending one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use weatherdash_weather::{CitySuggestion, GeocodeClient};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

pub struct SuggestionService {
    geocoder: Arc<GeocodeClient>,
    debounce: Duration,
    next_id: AtomicU64,
    pending: Mutex<Option<(u64, CancellationToken)>>,
}

impl SuggestionService {
    pub fn new(geocoder: GeocodeClient, debounce: Duration) -> Self {
        Self {
            geocoder: Arc::new(geocoder),
            debounce,
            next_id: AtomicU64::new(0),
            pending: Mutex::new(None),
        }
    }

    /// Suggestions for `query`, or `None` when newer input superseded it.
    ///
    /// Lookup failures are logged and yield an empty list.
    pub async fn on_input(&self, query: &str) -> Option<Vec<CitySuggestion>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self.pending.lock().replace((id, token.clone())) {
            previous.cancel();
        }

        if query.trim().is_empty() {
            self.clear_pending(id);
            return Some(Vec::new());
        }

        let lookup = async {
            tokio::time::sleep(self.debounce).await;
            self.geocoder.suggest(query).await
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Suggestion lookup for {:?} superseded", query);
                return None;
            }
            result = lookup => result,
        };
        self.clear_pending(id);

        match result {
            Ok(suggestions) => Some(suggestions),
            Err(e) => {
                tracing::warn!("City suggestion lookup failed: {}", e);
                Some(Vec::new())
            }
        }
    }

    /// Abandon any pending lookup.
    pub fn cancel(&self) {
        if let Some((_, token)) = self.pending.lock().take() {
            token.cancel();
        }
    }

    fn clear_pending(&self, id: u64) {
        let mut pending = self.pending.lock();
        if matches!(pending.as_ref(), Some((current, _)) if *current == id) {
            *pending = None;
        }
    }
}
