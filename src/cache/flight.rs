//! Keyed cache with in-flight de-duplication.
//!
//! For a given key at most one fetch runs at a time. Callers that arrive while
//! it runs wait on a `watch` channel that receives the outcome exactly once,
//! so every waiter observes the same success or the same failure.
//!
//! Per key the order is always: fetch start, cache insert, removal from the
//! in-flight set, waiter release. The fetch itself runs in a spawned task, so
//! a caller that stops waiting does not cancel it for the others.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::error::{AssetError, Result};

type Outcome<V> = Option<Result<V>>;

struct FlightState<V> {
    entries: HashMap<String, V>,
    in_flight: HashMap<String, watch::Receiver<Outcome<V>>>,
}

fn lock<V>(state: &Mutex<FlightState<V>>) -> MutexGuard<'_, FlightState<V>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the key from the in-flight set when the fetch task ends, even if
/// the fetch panicked.
struct InFlightGuard<V> {
    state: Arc<Mutex<FlightState<V>>>,
    key: String,
}

impl<V> Drop for InFlightGuard<V> {
    fn drop(&mut self) {
        lock(&self.state).in_flight.remove(&self.key);
    }
}

pub struct FlightCache<V> {
    /// Label used in log lines
    label: &'static str,
    state: Arc<Mutex<FlightState<V>>>,
}

impl<V> FlightCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: Arc::new(Mutex::new(FlightState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
        }
    }

    /// Return the cached value for `key`, join the fetch already running for
    /// it, or start `fetch` and wait for it.
    ///
    /// `fetch` is only called when this caller starts the fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (mut rx, started) = {
            let mut state = lock(&self.state);

            if let Some(value) = state.entries.get(key) {
                tracing::trace!(cache = self.label, key, "hit");
                return Ok(value.clone());
            }

            match state.in_flight.get(key) {
                Some(rx) => {
                    tracing::debug!(cache = self.label, key, "joining in-flight fetch");
                    (rx.clone(), None)
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight.insert(key.to_string(), rx.clone());
                    (rx, Some(tx))
                }
            }
        };

        if let Some(tx) = started {
            tracing::debug!(cache = self.label, key, "miss, starting fetch");
            self.spawn_fetch(key.to_string(), tx, fetch());
        }

        // Bound to a local so the borrowed `Ref` ends before `rx` is dropped
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome)
                .clone()
                .unwrap_or_else(|| Err(AssetError::Aborted(key.to_string()))),
            Err(_) => Err(AssetError::Aborted(key.to_string())),
        };
        outcome
    }

    fn spawn_fetch<Fut>(&self, key: String, tx: watch::Sender<Outcome<V>>, fetch: Fut)
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let label = self.label;

        tokio::spawn(async move {
            let guard = InFlightGuard {
                state: Arc::clone(&state),
                key: key.clone(),
            };

            let result = fetch.await;
            match &result {
                Ok(value) => {
                    lock(&state).entries.insert(key.clone(), value.clone());
                    tracing::debug!(cache = label, key = %key, "cached");
                }
                Err(e) => tracing::warn!(cache = label, key = %key, error = %e, "fetch failed"),
            }

            drop(guard);
            tx.send_replace(Some(result));
        });
    }

    /// Cached value without fetching
    pub fn get(&self, key: &str) -> Option<V> {
        lock(&self.state).entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.state).in_flight.contains_key(key)
    }

    /// Drop the cached value for `key`. Refused (returns `None`) while a
    /// fetch for the key is running.
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut state = lock(&self.state);
        if state.in_flight.contains_key(key) {
            return None;
        }
        state.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.state).entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
