//! The metric store: an append-only in-memory observation log keyed by
//! (agent, task). Lives for the server process lifetime; callers serialise
//! access behind a lock.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use nettask_proto::AgentId;

/// One textual measurement result, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    pub received_at: DateTime<Local>,
}

#[derive(Debug, Default)]
pub struct MetricStore {
    observations: HashMap<(AgentId, u16), Vec<Observation>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, agent: AgentId, task_id: u16, text: String) {
        self.observations
            .entry((agent, task_id))
            .or_default()
            .push(Observation { text, received_at: Local::now() });
    }

    /// Every observation, grouped by (agent, task) in stable key order.
    pub fn all(&self) -> Vec<((AgentId, u16), &[Observation])> {
        let mut groups: Vec<_> = self
            .observations
            .iter()
            .map(|(key, observations)| (*key, observations.as_slice()))
            .collect();
        groups.sort_by_key(|(key, _)| *key);
        groups
    }

    /// Observations for one task id across all agents.
    pub fn by_task(&self, task_id: u16) -> Vec<(AgentId, &Observation)> {
        self.all()
            .into_iter()
            .filter(|((_, task), _)| *task == task_id)
            .flat_map(|((agent, _), observations)| {
                observations.iter().map(move |obs| (agent, obs))
            })
            .collect()
    }

    /// The most recent observation for (agent, task).
    pub fn latest(&self, agent: AgentId, task_id: u16) -> Option<&Observation> {
        self.observations.get(&(agent, task_id))?.last()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
