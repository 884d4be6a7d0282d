//! # LogWriter: runtime events as `tracing` records
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  [started] task=#1 name="basic"
//! DEBUG [suspended] task=#3 name="login" effect=TAKE
//! INFO  [dispatched] action="LOGIN_SUBMIT" woken=1
//! WARN  [failed] task=#2 name="connectordb" reason="call to `sync` failed: offline"
//! INFO  [restart-scheduled] name="connectordb" attempt=1 delay_ms=500
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let tag = e.kind.as_str();
        let task = e.task.map(|t| t.to_string());
        let task = task.as_deref().unwrap_or("-");
        let name = e.name.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskStarted | EventKind::TaskCompleted | EventKind::TaskCancelled => {
                tracing::info!(task, name, parent = ?e.parent, "[{tag}]");
            }
            EventKind::TaskSuspended => {
                let effect = e.effect.map(|k| k.as_str()).unwrap_or("-");
                tracing::debug!(task, name, effect, "[{tag}]");
            }
            EventKind::TaskFailed => {
                tracing::warn!(task, name, reason = e.reason.as_deref(), "[{tag}]");
            }
            EventKind::ActionDispatched => {
                tracing::info!(action = e.action.as_deref(), woken = e.woken, "[{tag}]");
            }
            EventKind::ResumptionDropped => {
                tracing::debug!(task, reason = e.reason.as_deref(), "[{tag}]");
            }
            EventKind::RestartScheduled => {
                tracing::info!(
                    name,
                    attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    reason = e.reason.as_deref(),
                    "[{tag}]"
                );
            }
            EventKind::RestartExhausted => {
                tracing::warn!(name, attempt = e.attempt, "[{tag}]");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(reason = e.reason.as_deref(), "[{tag}]");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(subscriber = name, reason = e.reason.as_deref(), "[{tag}]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
