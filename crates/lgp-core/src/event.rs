//! Diagnostic events: a typed sink the caller owns and passes in explicitly,
//! rather than a global event-dispatcher singleton.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One observable moment in a run. Drivers emit these; they never hold
/// evaluation results themselves, so a slow sink can't stall evolution.
#[derive(Debug, Clone)]
pub enum Event {
    GenerationStarted { generation: usize },
    BestFitnessImproved { generation: usize, fitness: f64 },
    MigrationPerformed {
        generation: usize,
        from_island: usize,
        to_island: usize,
        migrants: usize,
    },
    Cancelled { generation: usize },
}

/// Receiver for engine diagnostics. `log::info!`/`log::debug!` cover ambient
/// observability; `EventSink` is for callers (a CLI progress bar, a test
/// harness) that want structured, typed notifications instead of parsing log
/// lines.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: Event);
}

/// Discards everything. The default when a caller doesn't care to observe a
/// run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&self, _event: Event) {}
}

/// Forwards every event through the `log` crate at a level matching its
/// severity, the way the rest of this crate reports progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn notify(&self, event: Event) {
        match event {
            Event::GenerationStarted { generation } => {
                log::debug!("generation {generation} started")
            }
            Event::BestFitnessImproved { generation, fitness } => {
                log::info!("generation {generation}: best fitness improved to {fitness}")
            }
            Event::MigrationPerformed {
                generation,
                from_island,
                to_island,
                migrants,
            } => log::info!(
                "generation {generation}: {migrants} migrant(s) moved island {from_island} -> {to_island}"
            ),
            Event::Cancelled { generation } => log::warn!("run cancelled at generation {generation}"),
        }
    }
}

/// Shared, clonable cancellation flag a driver polls once per generation for
/// graceful shutdown. Checking happens at generation boundaries only — a run
/// is never interrupted mid-evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
