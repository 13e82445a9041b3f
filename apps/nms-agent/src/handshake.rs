//! Client side of the three-way registration handshake.

use std::net::{SocketAddr, UdpSocket};

use nettask_proto::constants::{HANDSHAKE_TIMEOUT, MAX_DATAGRAM};
use nettask_proto::{encode_handshake_ack, encode_register, Ack, AgentBound, AgentId};
use nettask_sequenced::INITIAL_SEQUENCE;
use tracing::{debug, info};

use crate::error::{AgentError, AgentResult};

/// Registers with the server: REGISTER, wait for its ACK, confirm with an
/// ACK of our own, wait for the final ACK. Any validation failure abandons
/// the handshake and is fatal to the agent; there is no retry.
pub fn register(sock: &UdpSocket, server: SocketAddr, agent: AgentId) -> AgentResult<()> {
    sock.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

    sock.send_to(&encode_register(INITIAL_SEQUENCE, agent), server)?;
    debug!(%agent, %server, "REGISTER sent");

    let ack = wait_for_ack(sock, server)?;
    validate(&ack, agent, server, "server ACK")?;

    sock.send_to(&encode_handshake_ack(INITIAL_SEQUENCE, agent), server)?;
    let final_ack = wait_for_ack(sock, server)?;
    validate(&final_ack, agent, server, "final ACK")?;

    info!(%agent, %server, "registered");
    Ok(())
}

fn wait_for_ack(sock: &UdpSocket, server: SocketAddr) -> AgentResult<Ack> {
    let mut buf = [0u8; MAX_DATAGRAM];
    let (len, _from) = sock.recv_from(&mut buf).map_err(|e| AgentError::Registration {
        server,
        reason: format!("no handshake reply: {e}"),
    })?;
    match AgentBound::decode(&buf[..len]) {
        Ok(AgentBound::Ack(ack)) => Ok(ack),
        Ok(other) => Err(AgentError::Registration {
            server,
            reason: format!("expected ACK, got {other:?}"),
        }),
        Err(e) => Err(AgentError::Registration {
            server,
            reason: format!("malformed handshake reply: {e}"),
        }),
    }
}

fn validate(ack: &Ack, agent: AgentId, server: SocketAddr, step: &str) -> AgentResult<()> {
    if ack.seq == INITIAL_SEQUENCE && ack.agent == Some(agent) {
        Ok(())
    } else {
        Err(AgentError::Registration {
            server,
            reason: format!("{step} did not echo our identity: {ack:?}"),
        })
    }
}
