//! # NetTask sequenced delivery
//!
//! The deterministic half of at-least-once task delivery: per-agent sequence
//! assignment and FIFO pending queues on the sending side, the retry state
//! machine for a single dispatch, and the single-counter acceptor on the
//! receiving side. No sockets and no clocks live here; the endpoints drive
//! these state machines from their receive loops and feed acknowledgements
//! in as they observe them.

pub mod error;
pub mod inbound;
pub mod outbound;

pub use error::SequencedError;
pub use inbound::{InboundSequencer, SequenceVerdict};
pub use outbound::{DispatchState, OutboundDispatch, PendingTask, TaskDispatch};

/// First sequence number assigned to (and expected from) a newly seen agent.
pub const INITIAL_SEQUENCE: u16 = 1;
