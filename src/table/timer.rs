use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{HandId, SeatId};

use super::actor::TableCmd;

const LOG_TARGET: &str = "pokerd::table::timer";

/// The turn clock for the acting seat.
///
/// Arming cancels any previous timer; on expiry a [`TableCmd::TurnTimeout`]
/// is fed back through the table's own command channel, so the timeout is
/// serialized with client actions and simply voided by the actor if the hand
/// or turn has moved on by the time it is processed.
#[derive(Debug, Default)]
pub struct ActionTimer {
    token: Option<CancellationToken>,
}

impl ActionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(
        &mut self,
        tx: mpsc::Sender<TableCmd>,
        timeout: Duration,
        hand_id: HandId,
        seat: SeatId,
    ) {
        self.cancel();
        let token = CancellationToken::new();
        let task_token = token.clone();
        self.token = Some(token);
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    debug!(target = LOG_TARGET, %hand_id, seat, "turn clock expired");
                    let _ = tx.send(TableCmd::TurnTimeout { hand_id, seat }).await;
                }
            }
        });
    }

    /// Idempotent: cancelling an unarmed or already-cancelled timer is a no-op.
    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
