use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use super::SessionShared;
use crate::model::AnswerPayload;

pub(crate) struct SaveRequest {
    pub(crate) question_id: Uuid,
    pub(crate) payload: AnswerPayload,
}

/// Answer persistence buffer: one deadline per question, so continuous
/// edits to one question cannot starve saves of another. Every new edit
/// resets only its own question's deadline; when a deadline passes, the
/// latest payload for that question is upserted once.
pub(crate) fn spawn_answer_buffer(
    shared: Arc<SessionShared>,
    mut rx: mpsc::UnboundedReceiver<SaveRequest>,
    debounce: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: HashMap<Uuid, (AnswerPayload, Instant)> = HashMap::new();

        loop {
            let next_deadline = pending.values().map(|(_, deadline)| *deadline).min();

            tokio::select! {
                request = rx.recv() => match request {
                    Some(SaveRequest { question_id, payload }) => {
                        pending.insert(question_id, (payload, Instant::now() + debounce));
                    }
                    None => {
                        // Teardown: push whatever is still buffered before exiting.
                        let batch: Vec<(Uuid, AnswerPayload)> =
                            pending.drain().map(|(id, (payload, _))| (id, payload)).collect();
                        flush(&shared, batch).await;
                        break;
                    }
                },
                _ = wait_until(next_deadline) => {
                    let now = Instant::now();
                    let due: Vec<Uuid> = pending
                        .iter()
                        .filter(|(_, (_, deadline))| *deadline <= now)
                        .map(|(id, _)| *id)
                        .collect();
                    let mut batch = Vec::with_capacity(due.len());
                    for question_id in due {
                        if let Some((payload, _)) = pending.remove(&question_id) {
                            batch.push((question_id, payload));
                        }
                    }
                    flush(&shared, batch).await;
                }
            }
        }
    })
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn flush(shared: &SessionShared, batch: Vec<(Uuid, AnswerPayload)>) {
    if batch.is_empty() {
        return;
    }
    // Once the attempt left in_progress the backend rejects answer writes
    // anyway; drop the batch instead of producing noise.
    if shared.lock_state().locked {
        return;
    }

    for (question_id, payload) in batch {
        match shared.backend.upsert_answer(shared.attempt.id, question_id, &payload).await {
            Ok(()) => {
                metrics::counter!("aula_answers_saved_total").increment(1);
                tracing::debug!(question_id = %question_id, kind = payload.kind(), "Answer saved");
            }
            Err(err) => {
                // Best effort: the in-memory answer stays, the next debounce
                // cycle bounds the loss. The student is never interrupted.
                metrics::counter!("aula_answer_save_failures_total").increment(1);
                tracing::error!(error = %err, question_id = %question_id, "Failed to save answer");
            }
        }
    }
}
