//! Hive concurrency core.
//!
//! Five tightly coupled components host many independent agents, each driven
//! by request/response calls to an external reasoning service:
//!
//! - [`bus::MessageBus`] - one FIFO queue per recipient plus a blocking
//!   "wait for next message" primitive.
//! - [`cancel::CancelManager`] - per-agent cancellation epochs; the single
//!   source of truth for "is this computation still valid?".
//! - [`contacts::ContactRegistry`] - per-agent allow-list gating every
//!   outbound send.
//! - [`scheduler::Scheduler`] - drains the bus into per-agent work and
//!   enforces at most one active turn per agent.
//! - [`turn`] - executes one turn: context build, reasoning call, tool loop,
//!   and the interruption-retry protocol.
//!
//! The guarantees, in one line each: per-recipient message order is
//! preserved; exactly one turn is active per agent at any instant; an
//! agent's epoch strictly increases on every abort; and a result produced
//! under epoch E is applied only if the agent's epoch is still E.

pub mod bus;
pub mod cancel;
pub mod compact;
pub mod config;
pub mod contacts;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod turn;

pub use bus::{MessageBus, WaitOutcome};
pub use cancel::{AbortReason, Aborted, CancelManager, Scope, ScopeInvalidated};
pub use config::EngineConfig;
pub use contacts::{ContactRegistry, SendDenied};
pub use runtime::{ComputeStatus, Runtime, SpawnError};
pub use scheduler::Scheduler;
pub use store::{ConversationStore, InMemoryStore, StoreError};
pub use turn::TurnOutcome;
