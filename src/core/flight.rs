//! Single-flight de-duplication of cache refreshes.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

type Flight<T> = Shared<BoxFuture<'static, T>>;

/// Collapses concurrent runs of the same operation into one.
///
/// While a flight is pending, every caller of [`SingleFlight::run`] awaits the
/// same shared future and receives a clone of its output. The slot is cleared
/// once the flight completes, so the next call starts a fresh one.
pub struct SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    current: Mutex<Option<(u64, Flight<T>)>>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Joins the pending flight, or starts one with `start` if none is pending.
    pub async fn run<F>(&self, start: F) -> T
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let (id, flight) = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            match current.as_ref() {
                Some((id, flight)) => {
                    debug!(flight = id, "Joining in-flight operation");
                    (*id, flight.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    debug!(flight = id, "Starting operation");
                    let flight = start().shared();
                    *current = Some((id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let output = flight.await;

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(active, _)| *active == id) {
            *current = None;
        }
        output
    }

    #[cfg(test)]
    fn is_in_flight(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
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
