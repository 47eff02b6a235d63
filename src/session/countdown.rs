use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{finalize, SessionEvent, SessionShared};
use crate::model::FinalizeReason;

/// Advisory one-second countdown for time-limited evaluations. The tick
/// decrements the locally derived value for display; the authoritative
/// check stays the wall-clock computation done at load. Stops as soon as
/// the session leaves `in_progress` or teardown is signalled.
pub(crate) fn spawn_countdown(
    shared: Arc<SessionShared>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    let expired = {
                        let mut state = shared.lock_state();
                        if state.locked || state.terminal.is_some() {
                            break;
                        }
                        match state.remaining_seconds {
                            Some(remaining) if remaining > 0 => {
                                let next = remaining - 1;
                                state.remaining_seconds = Some(next);
                                shared.emit(SessionEvent::Tick { remaining_seconds: next });
                                next == 0
                            }
                            _ => break,
                        }
                    };

                    if expired {
                        if let Err(err) =
                            finalize::finalize(&shared, FinalizeReason::TimeExpired).await
                        {
                            tracing::error!(error = %err, "Failed to finalize attempt at deadline");
                        }
                        break;
                    }
                }
            }
        }
    })
}
