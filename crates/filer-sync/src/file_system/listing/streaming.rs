//! Streaming directory population: batches produced on a blocking thread, pulled by the loop.
//!
//! The producer reads one batch, hands it over through a small bounded channel, and blocks until
//! the loop has room again, so it never runs far ahead of what the loop has applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::file_system::listing::metadata::EntryMetadata;
use crate::file_system::listing::reading::DirectoryStream;

/// Batches buffered between producer and loop
const POPULATION_CHANNEL_CAPACITY: usize = 2;

/// Shared state for an in-progress population
#[derive(Debug, Default)]
pub struct PopulationState {
    /// Checked once per batch by the producer.
    pub cancelled: AtomicBool,
}

/// Handle to an in-flight streaming population.
///
/// Dropping it cancels the producer: the next send fails and the thread exits.
pub struct Population {
    state: Arc<PopulationState>,
    batches: mpsc::Receiver<Vec<EntryMetadata>>,
    loaded: usize,
}

impl Population {
    /// Waits for the next batch. `None` means the directory is exhausted (or the producer died).
    pub async fn next_batch(&mut self) -> Option<Vec<EntryMetadata>> {
        let batch = self.batches.recv().await?;
        self.loaded += batch.len();
        Some(batch)
    }

    /// Entries received so far.
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Relaxed)
    }
}

impl Drop for Population {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts streaming `stream` from a blocking thread. Must be called inside a tokio runtime.
pub fn spawn_population(mut stream: DirectoryStream) -> Population {
    let state = Arc::new(PopulationState::default());
    let (tx, rx) = mpsc::channel(POPULATION_CHANNEL_CAPACITY);
    let producer_state = Arc::clone(&state);

    tokio::task::spawn_blocking(move || {
        let started = std::time::Instant::now();
        let mut sent = 0usize;
        while !producer_state.cancelled.load(Ordering::Relaxed) {
            let Some(batch) = stream.next_batch() else {
                break;
            };
            sent += batch.len();
            if tx.blocking_send(batch).is_err() {
                // Receiver gone: population was superseded
                break;
            }
        }
        log::debug!(
            "Population of {} stopped: sent={}, skipped={}, cancelled={}, {}ms",
            stream.directory().display(),
            sent,
            stream.skipped(),
            producer_state.cancelled.load(Ordering::Relaxed),
            started.elapsed().as_millis()
        );
    });

    Population {
        state,
        batches: rx,
        loaded: 0,
    }
}
