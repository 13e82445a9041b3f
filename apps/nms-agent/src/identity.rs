//! Agent identity derivation.

use nettask_proto::AgentId;

/// Derives the agent identifier: an explicit override when given, otherwise
/// the first three characters of the machine host name.
pub fn derive(override_id: Option<&str>) -> AgentId {
    match override_id {
        Some(id) => AgentId::from_host(id),
        None => {
            let host = sysinfo::System::host_name().unwrap_or_else(|| "nms".to_owned());
            AgentId::from_host(&host)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(derive(Some("A01")), AgentId::from_host("A01"));
    }

    #[test]
    fn test_hostname_fallback_yields_three_octets() {
        let id = derive(None);
        assert_eq!(id.as_bytes().len(), 3);
    }
}
