use std::sync::Arc;
use std::time::Duration;

use super::{finalize, SessionEvent, SessionShared};
use crate::model::{FinalizeReason, IntegrityEventKind};

/// Page-level events the UI host forwards to the integrity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// The exam document became hidden (tab switch, window minimize).
    VisibilityHidden,
    Copy,
    Paste,
    ContextMenu,
}

/// Whether the host should prevent the event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Allow,
    Suppress,
}

/// Focus-loss is a heuristic proxy for leaving the exam to look things up:
/// the first violations show a transient warning, the configured limit
/// blocks and submits the attempt. Clipboard and context-menu use is
/// suppressed and logged but never counts toward the limit.
pub(crate) async fn handle_page_event(
    shared: &Arc<SessionShared>,
    event: PageEvent,
) -> EventDisposition {
    match event {
        PageEvent::VisibilityHidden => handle_focus_loss(shared).await,
        PageEvent::Copy => suppress_and_log(shared, IntegrityEventKind::CopyAttempt),
        PageEvent::Paste => suppress_and_log(shared, IntegrityEventKind::PasteAttempt),
        PageEvent::ContextMenu => suppress_and_log(shared, IntegrityEventKind::ContextMenu),
    }
}

async fn handle_focus_loss(shared: &Arc<SessionShared>) -> EventDisposition {
    let violations = {
        let mut state = shared.lock_state();
        // A blocked session is already terminal; let events pass through.
        if state.locked || state.terminal.is_some() {
            return EventDisposition::Allow;
        }
        state.violations += 1;
        state.violations
    };

    spawn_integrity_log(shared, IntegrityEventKind::FocusChange);
    metrics::counter!("aula_integrity_events_total", "kind" => "focus_change").increment(1);

    if violations < shared.exam.max_focus_violations {
        tracing::warn!(attempt_id = %shared.attempt.id, violations, "Focus loss detected");
        shared.emit(SessionEvent::Warning { violations });
        schedule_warning_clear(shared);
    } else {
        tracing::warn!(attempt_id = %shared.attempt.id, violations, "Blocking attempt after repeated focus loss");
        if let Some(timer) = shared.lock_state().warning_timer.take() {
            timer.abort();
        }
        shared.emit(SessionEvent::Blocked);
        if let Err(err) = finalize::finalize(shared, FinalizeReason::BlockedByFocus).await {
            tracing::error!(error = %err, "Failed to finalize focus-blocked attempt");
        }
    }

    EventDisposition::Allow
}

fn suppress_and_log(shared: &Arc<SessionShared>, kind: IntegrityEventKind) -> EventDisposition {
    {
        let state = shared.lock_state();
        if state.locked || state.terminal.is_some() {
            return EventDisposition::Allow;
        }
    }
    spawn_integrity_log(shared, kind);
    metrics::counter!("aula_integrity_events_total", "kind" => kind.as_str()).increment(1);
    EventDisposition::Suppress
}

/// Best-effort remote log; failures are ignored so the exam flow is never
/// interrupted by telemetry.
fn spawn_integrity_log(shared: &Arc<SessionShared>, kind: IntegrityEventKind) {
    let backend = Arc::clone(&shared.backend);
    let attempt_id = shared.attempt.id;
    tokio::spawn(async move {
        if let Err(err) = backend.log_integrity_event(attempt_id, kind).await {
            tracing::debug!(error = %err, kind = kind.as_str(), "Failed to log integrity event");
        }
    });
}

/// The warning banner auto-dismisses after a fixed delay; a newer warning
/// replaces the pending dismissal.
fn schedule_warning_clear(shared: &Arc<SessionShared>) {
    let cleared_after = Duration::from_secs(shared.exam.warning_visible_seconds);
    let task_shared = Arc::clone(shared);
    let handle = tokio::spawn(async move {
        tokio::time::sleep(cleared_after).await;
        task_shared.emit(SessionEvent::WarningCleared);
        task_shared.lock_state().warning_timer = None;
    });

    let mut state = shared.lock_state();
    if let Some(previous) = state.warning_timer.replace(handle) {
        previous.abort();
    }
}
