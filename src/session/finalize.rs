use std::sync::Arc;

use super::{SessionEvent, SessionShared};
use crate::backend::{BackendError, StatusUpdate};
use crate::core::time::now_utc;
use crate::model::{AttemptStatus, FinalizeReason};

/// Terminal status for a finalize path. A focus block records as such
/// regardless of question mix; otherwise any open-response question routes
/// the attempt to manual review instead of auto grading.
pub(crate) fn terminal_status(reason: FinalizeReason, has_open_response: bool) -> AttemptStatus {
    match reason {
        FinalizeReason::BlockedByFocus => AttemptStatus::BlockedByFocus,
        _ if has_open_response => AttemptStatus::PendingManualReview,
        _ => AttemptStatus::Completed,
    }
}

/// The single terminal transition, shared by manual submission, deadline
/// expiry and the focus block. Reentrant-safe: a local in-flight flag stops
/// same-session races and the conditional remote update stops cross-tab
/// ones; whichever caller lands the update owns the termination reason.
pub(crate) async fn finalize(
    shared: &Arc<SessionShared>,
    reason: FinalizeReason,
) -> Result<(), BackendError> {
    {
        let mut state = shared.lock_state();
        if state.terminal.is_some() || state.finalizing {
            return Ok(());
        }
        state.finalizing = true;
        // Lock the UI before any remote call begins. The answer channel is
        // only closed once the status update lands, so a failed finalize
        // leaves the session fully operational for a retry.
        state.locked = true;
        if let Some(timer) = state.warning_timer.take() {
            timer.abort();
        }
    }

    let status = terminal_status(reason, shared.has_open_response);

    match shared.backend.update_attempt_status(shared.attempt.id, status, Some(now_utc())).await {
        Ok(StatusUpdate::Applied) => {}
        Ok(StatusUpdate::Conflict) => {
            // Another tab or path already closed this attempt; its state is
            // authoritative. Leave quietly, no error shown.
            tracing::warn!(attempt_id = %shared.attempt.id, "Attempt already finalized elsewhere");
            shared.lock_state().save_tx = None;
            shared.emit(SessionEvent::NavigateAway);
            return Ok(());
        }
        Err(err) => {
            // Roll the guards back entirely; a bricked exam screen is worse
            // than letting the student press submit again.
            let mut state = shared.lock_state();
            state.finalizing = false;
            state.locked = false;
            return Err(err);
        }
    }

    {
        let mut state = shared.lock_state();
        state.terminal = Some(status);
        state.save_tx = None;
    }
    metrics::counter!("aula_attempts_finalized_total", "reason" => reason.as_str()).increment(1);
    tracing::info!(
        attempt_id = %shared.attempt.id,
        reason = reason.as_str(),
        status = ?status,
        "Attempt finalized"
    );

    if !shared.has_open_response {
        // Fire-and-forget from the session's perspective: the attempt is
        // already recorded as submitted, grading durability is the
        // backend's concern.
        if let Err(err) = shared.backend.trigger_auto_grading(shared.attempt.id).await {
            tracing::error!(error = %err, attempt_id = %shared.attempt.id, "Failed to trigger auto grading");
        }
    }

    shared.emit(SessionEvent::Finalized { reason, status });
    shared.emit(SessionEvent::NavigateAway);
    Ok(())
}
