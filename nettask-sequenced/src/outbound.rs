use std::collections::{HashMap, VecDeque};

use nettask_proto::{encode_task, AgentId, Task};

use crate::INITIAL_SEQUENCE;

/// A task encoded and queued for one agent, awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub seq: u16,
    pub task_id: u16,
    pub pdu: Vec<u8>,
}

/// Sending-side sequencing state: one monotonically increasing counter and
/// one strict-FIFO pending queue per destination agent, independent across
/// agents. Sequence numbers are assigned at enqueue time, when the task is
/// encoded.
#[derive(Debug, Default)]
pub struct OutboundDispatch {
    counters: HashMap<AgentId, u16>,
    queues: HashMap<AgentId, VecDeque<PendingTask>>,
}

impl OutboundDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next sequence number for `agent`, encodes the task and
    /// appends it to the agent's queue. Returns the assigned sequence.
    pub fn enqueue(&mut self, agent: AgentId, task: &Task) -> u16 {
        let counter = self.counters.entry(agent).or_insert(INITIAL_SEQUENCE);
        let seq = *counter;
        *counter = counter.wrapping_add(1);

        let pdu = encode_task(seq, task);
        self.queues
            .entry(agent)
            .or_default()
            .push_back(PendingTask { seq, task_id: task.task_id, pdu });
        seq
    }

    /// Takes the next task for `agent` off its queue, in FIFO order.
    pub fn pop_next(&mut self, agent: AgentId) -> Option<PendingTask> {
        self.queues.get_mut(&agent)?.pop_front()
    }

    pub fn pending(&self, agent: AgentId) -> usize {
        self.queues.get(&agent).map_or(0, VecDeque::len)
    }

    /// Removes `agent`'s queued entry for `seq`. No-op when absent, which is
    /// how a late ACK for an already-dispatched task lands. Sequence numbers
    /// only identify tasks within one agent's queue, so the lookup never
    /// crosses agents.
    pub fn acknowledge(&mut self, agent: AgentId, seq: u16) -> bool {
        let Some(queue) = self.queues.get_mut(&agent) else {
            return false;
        };
        match queue.iter().position(|p| p.seq == seq) {
            Some(pos) => {
                queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops everything still queued for `agent`. The sequence counter is
    /// kept so a re-registering agent does not see numbers repeat.
    pub fn drop_agent(&mut self, agent: AgentId) {
        self.queues.remove(&agent);
    }
}

/// Dispatch lifecycle of a single queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Queued,
    InFlight { attempt: u8 },
    Confirmed,
    Dropped,
}

/// Retry bookkeeping for one task being pushed to an agent. The caller
/// transmits [`TaskDispatch::pdu`] after each successful `begin_attempt`,
/// waits for an acknowledgement, and feeds observed sequence numbers into
/// [`TaskDispatch::on_ack`].
#[derive(Debug)]
pub struct TaskDispatch {
    pending: PendingTask,
    state: DispatchState,
}

impl TaskDispatch {
    pub fn new(pending: PendingTask) -> Self {
        Self { pending, state: DispatchState::Queued }
    }

    pub fn seq(&self) -> u16 {
        self.pending.seq
    }

    pub fn task_id(&self) -> u16 {
        self.pending.task_id
    }

    pub fn pdu(&self) -> &[u8] {
        &self.pending.pdu
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Starts the next transmission attempt. Returns `false` once the
    /// attempt budget is spent (the dispatch moves to `Dropped`) or the
    /// dispatch already finished.
    pub fn begin_attempt(&mut self, budget: u8) -> bool {
        let next = match self.state {
            DispatchState::Queued => 1,
            DispatchState::InFlight { attempt } => attempt + 1,
            DispatchState::Confirmed | DispatchState::Dropped => return false,
        };
        if next > budget {
            self.state = DispatchState::Dropped;
            return false;
        }
        self.state = DispatchState::InFlight { attempt: next };
        true
    }

    /// Feeds an acknowledged sequence number observed on the wire. Returns
    /// `true` when it confirms this dispatch; mismatches leave the state
    /// untouched.
    pub fn on_ack(&mut self, seq: u16) -> bool {
        if matches!(self.state, DispatchState::InFlight { .. }) && seq == self.pending.seq {
            self.state = DispatchState::Confirmed;
            true
        } else {
            false
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == DispatchState::Confirmed
    }
}
