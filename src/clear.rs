//! drains every job in one state from a tube.
use std::collections::BTreeSet;

use tracing::warn;

use crate::client::{ClientError, Queue};
use crate::session::Session;
use crate::types::states::PeekState;

/// What to do when a job in the drain refuses to die.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeletePolicy {
    /// Log, leave the job behind, and keep draining.
    SkipFailures,
    /// Abort the drain on the first failed delete.
    Propagate,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClearOutcome {
    pub cleared: u64,
    /// Jobs left behind under `SkipFailures`.
    pub skipped: u64,
}

/// Deletes every job in `state` on `target` (the session's current tube
/// when None), by repeatedly peeking the oldest such job and deleting it
/// by id.
///
/// The previously-selected tube is restored on every path that got past
/// tube selection, error paths included; a failed selection means the tube
/// was never left and nothing is restored. Confirmation is the caller's
/// business: by the time this runs the operator has said yes.
pub async fn clear_state<Q: Queue>(
    session: &mut Session<Q>,
    target: Option<&str>,
    state: PeekState,
    policy: DeletePolicy,
) -> Result<ClearOutcome, ClientError> {
    let saved = session.current_tube().to_owned();
    let target = target.unwrap_or(&saved).to_owned();

    session.select_tube(&target).await?;

    let drained = drain(session.queue(), state, policy).await;
    let restored = session.select_tube(&saved).await;

    // A drain error outranks a restore error; both outrank the outcome.
    match (drained, restored) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(outcome), Ok(())) => Ok(outcome),
    }
}

async fn drain<Q: Queue>(
    queue: &mut Q,
    state: PeekState,
    policy: DeletePolicy,
) -> Result<ClearOutcome, ClientError> {
    let mut outcome = ClearOutcome::default();
    let mut failed: BTreeSet<u64> = BTreeSet::new();

    loop {
        let job = match queue.peek_state(state).await? {
            Some(job) => job,
            None => return Ok(outcome),
        };

        // Seeing a job we already failed to delete means the server will
        // keep handing it back: stop rather than spin on it.
        if failed.contains(&job.id) {
            return Ok(outcome);
        }

        match queue.delete(job.id).await {
            Ok(()) => outcome.cleared += 1,
            // Deleted out from under us between peek and delete; the next
            // peek moves on to the following job.
            Err(ClientError::NotFound) => {
                failed.insert(job.id);
            },
            Err(e) => match policy {
                DeletePolicy::Propagate => return Err(e),
                DeletePolicy::SkipFailures => {
                    warn!(
                        id = job.id,
                        %state,
                        error = %e,
                        "skipping job that failed to delete"
                    );
                    failed.insert(job.id);
                    outcome.skipped += 1;
                },
            },
        }
    }
}
