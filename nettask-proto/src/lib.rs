//! # NetTask wire protocol
//!
//! Binary framing for the datagram channel of the monitoring platform: a
//! 1-byte message kind followed by a big-endian body. The same type byte (3)
//! carries tasks travelling Server → Agent and results travelling
//! Agent → Server; the two shapes are never decoded against each other.
//! Callers pick the decode direction matching the socket they read from:
//! [`AgentBound::decode`] for datagrams arriving at an Agent,
//! [`ServerBound::decode`] for datagrams arriving at the Server.

use std::fmt;
use std::net::Ipv4Addr;

pub mod constants;

use constants::{
    AGENT_ID_LEN, HANDSHAKE_PDU_LEN, MIN_ACK_PDU, MIN_RESULT_PDU, MIN_TASK_PDU,
};

pub type ProtoResult<T> = Result<T, ProtoError>;

/// Decode failures. All of these are absorbed at the receive site with a log
/// line; none travel back over the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("datagram too short for {kind}: {len} bytes")]
    Truncated { kind: &'static str, len: usize },
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("unknown task type {0}")]
    UnknownTaskType(u8),
    #[error("interface name overruns datagram ({declared} bytes declared, {available} available)")]
    InterfaceOverrun { declared: usize, available: usize },
    #[error("task target needs 4 address bytes, got {0}")]
    ShortAddress(usize),
}

/// Wire value of each PDU kind (the leading byte of every datagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Register = 1,
    Ack = 2,
    /// Tasks Server → Agent, results Agent → Server; disambiguated by
    /// direction of travel only.
    Task = 3,
    Exit = 4,
}

/// Three-octet ASCII identifier of a monitored node. Fixed width on the
/// wire; shorter names are space-padded, display trims the padding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId([u8; AGENT_ID_LEN]);

impl AgentId {
    /// Derives an id from a host name: the first three bytes, space-padded
    /// when shorter. Uniqueness per deployment is assumed, not enforced.
    pub fn from_host(name: &str) -> Self {
        let mut id = [b' '; AGENT_ID_LEN];
        for (slot, byte) in id.iter_mut().zip(name.trim().bytes()) {
            *slot = byte;
        }
        AgentId(id)
    }

    pub fn from_wire(bytes: [u8; AGENT_ID_LEN]) -> Self {
        AgentId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; AGENT_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0).trim_end())
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self)
    }
}

/// The measurement a task requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskType {
    Cpu = 1,
    Ram = 2,
    Latency = 3,
    Jitter = 4,
    PacketLoss = 5,
    Bandwidth = 6,
}

impl TaskType {
    pub fn from_wire(raw: u8) -> ProtoResult<Self> {
        match raw {
            1 => Ok(TaskType::Cpu),
            2 => Ok(TaskType::Ram),
            3 => Ok(TaskType::Latency),
            4 => Ok(TaskType::Jitter),
            5 => Ok(TaskType::PacketLoss),
            6 => Ok(TaskType::Bandwidth),
            other => Err(ProtoError::UnknownTaskType(other)),
        }
    }

    /// Task types whose `data` field is a 4-byte IPv4 probe target.
    pub fn takes_target(self) -> bool {
        matches!(self, TaskType::Latency | TaskType::Jitter | TaskType::PacketLoss)
    }

    /// Task types sampled repeatedly over the duration window.
    pub fn is_periodic(self) -> bool {
        matches!(self, TaskType::Cpu | TaskType::Ram)
    }
}

/// Payload of a task: an IPv4 probe target for the ping-based types, free
/// text for everything else. Encoded as 4 address octets or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskData {
    Target(Ipv4Addr),
    Text(String),
}

impl TaskData {
    fn wire_len(&self) -> usize {
        match self {
            TaskData::Target(_) => 4,
            TaskData::Text(text) => text.len(),
        }
    }
}

/// A measurement assignment. Immutable once decoded; the wire sequence
/// number is carried separately by [`AgentBound::Task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_id: u16,
    pub task_type: TaskType,
    /// Interface to pre-check before probing; may be empty.
    pub interface_check: String,
    pub data: TaskData,
    /// Samples per emission for periodic probes, echo count for ping probes.
    pub frequency: u8,
    /// Wall-clock upper bound of the probe, seconds. Ignored by one-shots.
    pub duration: u8,
}

/// An acknowledgement. Handshake ACKs echo the agent id (6 bytes on the
/// wire); task-level ACKs carry only the sequence number (3 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: u16,
    pub agent: Option<AgentId>,
}

/// A datagram travelling Agent → Server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerBound {
    Register { seq: u16, agent: AgentId },
    Ack(Ack),
    Result { task_id: u16, agent: AgentId, payload: String },
    Exit { seq: u16 },
}

/// A datagram travelling Server → Agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentBound {
    Ack(Ack),
    Task { seq: u16, task: Task },
}

// --- Encoding ---

pub fn encode_register(seq: u16, agent: AgentId) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(HANDSHAKE_PDU_LEN);
    pdu.push(MessageKind::Register as u8);
    pdu.extend_from_slice(&seq.to_be_bytes());
    pdu.extend_from_slice(agent.as_bytes());
    pdu
}

/// An ACK that echoes the agent id, used during the registration handshake.
pub fn encode_handshake_ack(seq: u16, agent: AgentId) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(HANDSHAKE_PDU_LEN);
    pdu.push(MessageKind::Ack as u8);
    pdu.extend_from_slice(&seq.to_be_bytes());
    pdu.extend_from_slice(agent.as_bytes());
    pdu
}

/// A bare ACK for a task dispatch or a result submission. For results the
/// sequence field echoes the task id.
pub fn encode_task_ack(seq: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(MIN_ACK_PDU);
    pdu.push(MessageKind::Ack as u8);
    pdu.extend_from_slice(&seq.to_be_bytes());
    pdu
}

pub fn encode_task(seq: u16, task: &Task) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(MIN_TASK_PDU + task.interface_check.len() + task.data.wire_len());
    pdu.push(MessageKind::Task as u8);
    pdu.extend_from_slice(&seq.to_be_bytes());
    pdu.extend_from_slice(&task.task_id.to_be_bytes());
    pdu.push(task.task_type as u8);
    pdu.push(task.interface_check.len() as u8);
    pdu.extend_from_slice(task.interface_check.as_bytes());
    match &task.data {
        TaskData::Target(addr) => pdu.extend_from_slice(&addr.octets()),
        TaskData::Text(text) => pdu.extend_from_slice(text.as_bytes()),
    }
    pdu.push(task.frequency);
    pdu.push(task.duration);
    pdu
}

pub fn encode_result(task_id: u16, agent: AgentId, result: &str) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(MIN_RESULT_PDU + result.len());
    pdu.push(MessageKind::Task as u8);
    pdu.extend_from_slice(&task_id.to_be_bytes());
    pdu.extend_from_slice(agent.as_bytes());
    pdu.extend_from_slice(result.as_bytes());
    pdu
}

/// The EXIT signal. Its sequence field is ignored and conventionally zero.
pub fn encode_exit() -> Vec<u8> {
    let mut pdu = Vec::with_capacity(MIN_ACK_PDU);
    pdu.push(MessageKind::Exit as u8);
    pdu.extend_from_slice(&0u16.to_be_bytes());
    pdu
}

// --- Decoding ---

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

fn read_agent(buf: &[u8], at: usize) -> AgentId {
    AgentId::from_wire([buf[at], buf[at + 1], buf[at + 2]])
}

fn decode_ack(buf: &[u8]) -> ProtoResult<Ack> {
    if buf.len() < MIN_ACK_PDU {
        return Err(ProtoError::Truncated { kind: "ACK", len: buf.len() });
    }
    let seq = read_u16(buf, 1);
    let agent = (buf.len() >= HANDSHAKE_PDU_LEN).then(|| read_agent(buf, 3));
    Ok(Ack { seq, agent })
}

impl ServerBound {
    /// Decodes a datagram received on the Server's socket. Exactly one
    /// decode per datagram; the result is matched, never re-parsed.
    pub fn decode(buf: &[u8]) -> ProtoResult<Self> {
        let kind = *buf.first().ok_or(ProtoError::Truncated { kind: "PDU", len: 0 })?;
        match kind {
            1 => {
                if buf.len() < HANDSHAKE_PDU_LEN {
                    return Err(ProtoError::Truncated { kind: "REGISTER", len: buf.len() });
                }
                Ok(ServerBound::Register { seq: read_u16(buf, 1), agent: read_agent(buf, 3) })
            }
            2 => Ok(ServerBound::Ack(decode_ack(buf)?)),
            3 => {
                if buf.len() < MIN_RESULT_PDU {
                    return Err(ProtoError::Truncated { kind: "RESULT", len: buf.len() });
                }
                Ok(ServerBound::Result {
                    task_id: read_u16(buf, 1),
                    agent: read_agent(buf, 3),
                    payload: String::from_utf8_lossy(&buf[MIN_RESULT_PDU..]).into_owned(),
                })
            }
            4 => {
                if buf.len() < MIN_ACK_PDU {
                    return Err(ProtoError::Truncated { kind: "EXIT", len: buf.len() });
                }
                Ok(ServerBound::Exit { seq: read_u16(buf, 1) })
            }
            other => Err(ProtoError::UnknownMessageType(other)),
        }
    }
}

impl AgentBound {
    /// Decodes a datagram received on an Agent's socket.
    pub fn decode(buf: &[u8]) -> ProtoResult<Self> {
        let kind = *buf.first().ok_or(ProtoError::Truncated { kind: "PDU", len: 0 })?;
        match kind {
            2 => Ok(AgentBound::Ack(decode_ack(buf)?)),
            3 => {
                let (seq, task) = decode_task(buf)?;
                Ok(AgentBound::Task { seq, task })
            }
            other => Err(ProtoError::UnknownMessageType(other)),
        }
    }
}

fn decode_task(buf: &[u8]) -> ProtoResult<(u16, Task)> {
    if buf.len() < MIN_TASK_PDU {
        return Err(ProtoError::Truncated { kind: "TASK", len: buf.len() });
    }
    let seq = read_u16(buf, 1);
    let task_id = read_u16(buf, 3);
    let task_type = TaskType::from_wire(buf[5])?;
    let iface_len = buf[6] as usize;

    // Everything between the header and the 2-byte freq/duration trailer.
    let body = &buf[7..buf.len() - 2];
    if iface_len > body.len() {
        return Err(ProtoError::InterfaceOverrun { declared: iface_len, available: body.len() });
    }
    let interface_check = String::from_utf8_lossy(&body[..iface_len]).into_owned();
    let data_bytes = &body[iface_len..];

    let data = if task_type.takes_target() {
        if data_bytes.len() < 4 {
            return Err(ProtoError::ShortAddress(data_bytes.len()));
        }
        TaskData::Target(Ipv4Addr::new(data_bytes[0], data_bytes[1], data_bytes[2], data_bytes[3]))
    } else {
        TaskData::Text(String::from_utf8_lossy(data_bytes).into_owned())
    };

    let frequency = buf[buf.len() - 2];
    let duration = buf[buf.len() - 1];
    Ok((seq, Task { task_id, task_type, interface_check, data, frequency, duration }))
}
