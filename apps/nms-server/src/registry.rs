//! The agent registry: AgentID to endpoint, populated only by completed
//! registration handshakes.

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Local};
use nettask_proto::AgentId;

/// A registered agent endpoint and when we last heard from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEntry {
    pub addr: SocketAddr,
    pub registered_at: DateTime<Local>,
    pub last_seen: DateTime<Local>,
}

#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, AgentEntry>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes an agent; the most recently observed endpoint
    /// wins.
    pub fn insert(&mut self, agent: AgentId, addr: SocketAddr) {
        let now = Local::now();
        self.agents
            .entry(agent)
            .and_modify(|entry| {
                entry.addr = addr;
                entry.last_seen = now;
            })
            .or_insert(AgentEntry { addr, registered_at: now, last_seen: now });
    }

    /// Refreshes the last-seen stamp for a known agent. Returns `false` for
    /// agents that never completed a handshake.
    pub fn touch(&mut self, agent: AgentId) -> bool {
        match self.agents.get_mut(&agent) {
            Some(entry) => {
                entry.last_seen = Local::now();
                true
            }
            None => false,
        }
    }

    pub fn addr_of(&self, agent: AgentId) -> Option<SocketAddr> {
        self.agents.get(&agent).map(|entry| entry.addr)
    }

    /// Which agent, if any, registered from `addr`.
    pub fn agent_at(&self, addr: SocketAddr) -> Option<AgentId> {
        self.agents
            .iter()
            .find(|(_, entry)| entry.addr == addr)
            .map(|(agent, _)| *agent)
    }

    /// Removes whichever agent registered from `addr`, as the EXIT signal
    /// identifies agents by source endpoint only.
    pub fn remove_by_addr(&mut self, addr: SocketAddr) -> Option<AgentId> {
        let agent = self
            .agents
            .iter()
            .find(|(_, entry)| entry.addr == addr)
            .map(|(agent, _)| *agent)?;
        self.agents.remove(&agent);
        Some(agent)
    }

    /// All entries, in stable agent-id order.
    pub fn snapshot(&self) -> Vec<(AgentId, AgentEntry)> {
        let mut agents: Vec<_> = self
            .agents
            .iter()
            .map(|(agent, entry)| (*agent, entry.clone()))
            .collect();
        agents.sort_by_key(|(agent, _)| *agent);
        agents
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn test_insert_and_remove_by_addr() {
        let mut registry = AgentRegistry::new();
        let a01 = AgentId::from_host("A01");
        registry.insert(a01, addr(9000));

        assert_eq!(registry.addr_of(a01), Some(addr(9000)));
        assert_eq!(registry.remove_by_addr(addr(9000)), Some(a01));
        assert!(registry.is_empty());
        // Unknown endpoints remove nothing.
        assert_eq!(registry.remove_by_addr(addr(9000)), None);
    }

    #[test]
    fn test_reinsert_updates_endpoint() {
        let mut registry = AgentRegistry::new();
        let a01 = AgentId::from_host("A01");
        registry.insert(a01, addr(9000));
        registry.insert(a01, addr(9001));

        assert_eq!(registry.addr_of(a01), Some(addr(9001)));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_touch_only_known_agents() {
        let mut registry = AgentRegistry::new();
        let a01 = AgentId::from_host("A01");
        assert!(!registry.touch(a01));
        registry.insert(a01, addr(9000));
        assert!(registry.touch(a01));
    }

    #[test]
    fn test_snapshot_is_sorted_by_agent_id() {
        let mut registry = AgentRegistry::new();
        registry.insert(AgentId::from_host("B02"), addr(9001));
        registry.insert(AgentId::from_host("A01"), addr(9000));

        let ids: Vec<String> = registry.snapshot().iter().map(|(a, _)| a.to_string()).collect();
        assert_eq!(ids, vec!["A01", "B02"]);
    }
}
