//! Turn scheduler.
//!
//! The scheduler is the only component that moves messages off the bus. One
//! bookkeeping pass ([`Scheduler::step`]) routes every agent's pending mail:
//! mail for an active agent is buffered as interruptions and the agent's
//! computation is aborted; mail for an idle agent (plus anything buffered
//! earlier) becomes the input of a new turn. At most one turn is in flight
//! per agent, enforced by the arena's idle-to-active transition.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cancel::AbortReason;
use crate::runtime::{ComputeStatus, Runtime};
use crate::turn::{TurnInput, run_turn};

pub struct Scheduler {
    rt: Arc<Runtime>,
}

impl Scheduler {
    #[must_use]
    pub fn new(rt: Arc<Runtime>) -> Self {
        Self { rt }
    }

    /// One routing pass over every agent.
    ///
    /// The pass has two phases. Ingestion first sweeps every queue, so a
    /// message produced by a turn started in this pass is never consumed by
    /// the same pass; only once the sweep is complete are the collected
    /// turns spawned. Must run inside a tokio runtime; turns are spawned as
    /// tasks.
    pub fn step(&self) {
        let mut ready = Vec::new();
        for agent in self.rt.agent_ids() {
            match self.rt.agent_status(&agent) {
                Some(ComputeStatus::Active) => {
                    let pending = self.rt.bus().drain_queue(&agent);
                    if pending.is_empty() {
                        continue;
                    }
                    tracing::debug!(%agent, count = pending.len(), "interrupting active turn");
                    self.rt.buffer_interruptions(&agent, pending);
                    self.rt
                        .cancel()
                        .abort(&agent, AbortReason::MessageInterruption);
                    // Best-effort: also ask the provider to drop the call.
                    self.rt.reasoner().abort(&agent);
                }
                Some(ComputeStatus::Idle) => {
                    let interjected = self.rt.take_interruptions(&agent);
                    let fresh = self.rt.bus().drain_queue(&agent);
                    let input = TurnInput { fresh, interjected };
                    if input.is_empty() {
                        continue;
                    }
                    if !self.rt.mark_active(&agent) {
                        // Raced a concurrent transition; requeue as
                        // interruptions so the next pass picks them up.
                        self.rt.buffer_interruptions(&agent, input.interjected);
                        self.rt.buffer_interruptions(&agent, input.fresh);
                        continue;
                    }
                    ready.push((agent, input));
                }
                None => {}
            }
        }
        for (agent, input) in ready {
            let rt = Arc::clone(&self.rt);
            tokio::spawn(async move {
                let outcome = run_turn(Arc::clone(&rt), agent.clone(), input).await;
                tracing::debug!(%agent, ?outcome, "turn finished");
                rt.finish_turn(&agent);
            });
        }
    }

    /// Drive [`Self::step`] until `shutdown` fires.
    ///
    /// Between passes the loop parks on bus activity or a finished turn,
    /// with the configured tick as an upper bound on idle latency (a wake
    /// that slips between a pass and the park is caught by the next tick).
    pub async fn run(&self, shutdown: CancellationToken) {
        let tick = self.rt.config().scheduler_tick;
        loop {
            self.step();
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = self.rt.bus().wait_for_message(tick) => {}
                () = self.rt.turn_wake().notified() => {}
            }
        }
        tracing::debug!("scheduler stopped");
    }
}
