//! Source adapters
//!
//! One adapter per upstream system. An adapter performs a single sync pass
//! (one iteration, for continuous sources), pushes progress events through
//! its emitter, and returns the record count it could determine. Errors
//! never cross the boundary as panics; the engine catches those at the
//! worker seam.

pub mod faculty;
pub mod lms;
pub mod output;
pub mod process;
pub mod students;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::models::source::SourceKey;
use crate::services::progress::ProgressEmitter;

/// Cooperative cancellation flag for one pass or one continuous loop.
///
/// Monotonic: once triggered it stays triggered. Adapters poll it between
/// logical units of work; sleeps select on `triggered()` so a stop takes
/// effect without waiting out the interval.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has been triggered.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an adapter needs for one pass.
pub struct AdapterContext {
    pub db: DatabaseConnection,
    pub emitter: ProgressEmitter,
    pub stop: StopSignal,
    pub actor: String,
}

/// Failure of one adapter pass. Messages are short; detail lives in the
/// progress log ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    Failed(String),
    /// The pass was cancelled through its stop signal.
    Stopped,
}

impl AdapterError {
    pub fn failed(message: impl Into<String>) -> Self {
        AdapterError::Failed(message.into())
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Failed(msg) => f.write_str(msg),
            AdapterError::Stopped => f.write_str("stopped"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Contract every source adapter satisfies.
///
/// `Ok(Some(n))` is a pass that determined its record count; `Ok(None)`
/// means the output carried no terminal count and the engine falls back to
/// counting the canonical local table.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn key(&self) -> SourceKey;

    async fn run(&self, ctx: AdapterContext) -> Result<Option<i64>, AdapterError>;
}
