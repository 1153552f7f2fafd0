//! Single-flight coordination: collapsing concurrent identical operations
//! into one

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::AuthError;

type FlightFuture<T> = Shared<BoxFuture<'static, Result<T, AuthError>>>;

/// Deduplicates concurrent asynchronous operations by key.
///
/// While an operation for a key is outstanding, further callers for that key
/// join the in-flight future and share its single result (success or
/// failure). On completion the key is evicted, so the next call starts a
/// fresh operation rather than replaying a cached outcome.
///
/// In-process only: cross-instance races are handled by the caller's
/// authoritative-invalidation path, not here.
pub struct SingleFlight<T: Clone> {
    inflight: Mutex<HashMap<String, FlightFuture<T>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `operation` for `key`, or join the one already in flight.
    ///
    /// Every caller receives a clone of the same result, including any
    /// rejection. Whichever awaiter finishes first evicts the key; callers
    /// may be cancelled mid-flight (dropped futures, `select!`, timeouts)
    /// without stranding the entry in the map.
    pub async fn execute<F>(&self, key: &str, operation: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>> + Send + 'static,
    {
        let flight = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let flight = operation.boxed().shared();
                    inflight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        // Evict only if the map still holds the flight just awaited; a
        // fresh operation started by a later caller must not be removed.
        let mut inflight = self.inflight.lock().unwrap();
        if let Some(current) = inflight.get(key) {
            if current.ptr_eq(&flight) {
                inflight.remove(key);
            }
        }

        result
    }

    /// Number of operations currently in flight
    pub fn len(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }

    /// Whether no operation is currently in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
