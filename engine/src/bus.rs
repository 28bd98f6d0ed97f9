//! Message bus: one FIFO queue per recipient.
//!
//! The bus never reorders or duplicates; loss only occurs through an
//! explicit [`MessageBus::drain_queue`]. The wait primitive is a broadcast:
//! any send wakes every waiter, regardless of recipient, and each waiter is
//! responsible for re-checking its own predicate after waking.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;

use hive_types::{AgentId, Envelope, MessageId, NonEmptyString, TaskId};

/// Outcome of [`MessageBus::wait_for_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A message may be pending; the caller must re-check its own condition
    /// (wake-ups are broadcast and can be spurious for a given recipient).
    Resolved,
    TimedOut,
}

#[derive(Default)]
struct BusInner {
    queues: HashMap<AgentId, VecDeque<Envelope>>,
    next_id: u64,
}

#[derive(Default)]
pub struct MessageBus {
    inner: Mutex<BusInner>,
    notify: Notify,
}

impl MessageBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message at the tail of the recipient's queue and wake all
    /// waiters. Returns the bus-assigned id.
    pub fn send(
        &self,
        from: AgentId,
        to: AgentId,
        payload: NonEmptyString,
        task_id: Option<TaskId>,
    ) -> MessageId {
        let envelope = {
            let mut inner = self.inner.lock().expect("bus lock poisoned");
            inner.next_id += 1;
            let id = MessageId::new(inner.next_id);
            let envelope = Envelope::new(id, from, to.clone(), payload, task_id, SystemTime::now());
            inner.queues.entry(to).or_default().push_back(envelope.clone());
            envelope
        };
        self.notify.notify_waiters();
        tracing::trace!(id = %envelope.id(), from = %envelope.from(), to = %envelope.to(), "message enqueued");
        envelope.id()
    }

    /// Dequeue the head of the recipient's queue, if any.
    pub fn receive_next(&self, agent: &AgentId) -> Option<Envelope> {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.queues.get_mut(agent).and_then(VecDeque::pop_front)
    }

    /// Whether any queue holds a message.
    pub fn has_pending(&self) -> bool {
        let inner = self.inner.lock().expect("bus lock poisoned");
        inner.queues.values().any(|q| !q.is_empty())
    }

    /// Whether the given recipient has a pending message.
    pub fn has_pending_for(&self, agent: &AgentId) -> bool {
        let inner = self.inner.lock().expect("bus lock poisoned");
        inner.queues.get(agent).is_some_and(|q| !q.is_empty())
    }

    /// Drain and return everything pending for a recipient, in order.
    ///
    /// Serves both the scheduler's ingestion step and administrative
    /// cleanup on agent termination.
    pub fn drain_queue(&self, agent: &AgentId) -> Vec<Envelope> {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner
            .queues
            .get_mut(agent)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Suspend until any send occurs or the timeout elapses.
    ///
    /// Returns immediately if any queue is already non-empty. The waiter is
    /// enrolled in the notify list before the pending check (`notified()`
    /// alone only enrolls on first poll), so a send racing this call cannot
    /// be lost.
    pub async fn wait_for_message(&self, timeout: Duration) -> WaitOutcome {
        let mut notified = std::pin::pin!(self.notify.notified());
        notified.as_mut().enable();
        if self.has_pending() {
            return WaitOutcome::Resolved;
        }
        match tokio::time::timeout(timeout, notified).await {
            Ok(()) => WaitOutcome::Resolved,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
