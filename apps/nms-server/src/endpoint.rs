//! The server's NetTask endpoint: a single receive loop demultiplexing on
//! the leading PDU byte, plus the synchronous server side of the
//! registration handshake.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use nettask_proto::constants::{HANDSHAKE_TIMEOUT, MAX_DATAGRAM, RECV_POLL_TIMEOUT};
use nettask_proto::{encode_handshake_ack, encode_task_ack, AgentId, ServerBound};
use nettask_sequenced::OutboundDispatch;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::registry::AgentRegistry;
use crate::store::MetricStore;

/// State shared between the receive loop, the dispatcher and the menu.
#[derive(Default)]
pub struct ServerState {
    pub registry: Mutex<AgentRegistry>,
    pub outbound: Mutex<OutboundDispatch>,
    pub store: Mutex<MetricStore>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs the datagram receive loop until `running` clears. Registration is
/// handled synchronously in-line; ACKs are mirrored into `ack_tx` for the
/// dispatcher waiting on the menu thread.
pub fn run_receive_loop(
    sock: &UdpSocket,
    state: &ServerState,
    ack_tx: &mpsc::Sender<(SocketAddr, u16)>,
    running: &AtomicBool,
) -> io::Result<()> {
    let mut buf = [0u8; MAX_DATAGRAM];
    sock.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;

    while running.load(Ordering::Relaxed) {
        let (len, from) = match sock.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => return Err(e),
        };

        match ServerBound::decode(&buf[..len]) {
            Ok(ServerBound::Register { seq, agent }) => {
                handle_registration(sock, state, seq, agent, from)?;
            }
            Ok(ServerBound::Ack(ack)) => {
                // An entry disappearing here is a late ACK for a task the
                // dispatcher already gave up on.
                if let Some(agent) = state.registry.lock().agent_at(from) {
                    if state.outbound.lock().acknowledge(agent, ack.seq) {
                        debug!(%agent, seq = ack.seq, "late ack cleared queued task");
                    }
                }
                let _ = ack_tx.send((from, ack.seq));

                if let Some(agent) = ack.agent {
                    // A confirmation ACK arriving outside a handshake is a
                    // late registration confirmation; refresh the entry.
                    state.registry.lock().insert(agent, from);
                    debug!(%agent, %from, "confirmation ack refreshed registry");
                }
            }
            Ok(ServerBound::Result { task_id, agent, payload }) => {
                sock.send_to(&encode_task_ack(task_id), from)?;
                if state.registry.lock().touch(agent) {
                    info!(%agent, task_id, "metric received: {payload}");
                    state.store.lock().append(agent, task_id, payload);
                } else {
                    warn!(%agent, %from, "result from unregistered agent dropped");
                }
            }
            Ok(ServerBound::Exit { .. }) => match state.registry.lock().remove_by_addr(from) {
                Some(agent) => {
                    state.outbound.lock().drop_agent(agent);
                    info!(%agent, %from, "agent exited");
                }
                None => debug!(%from, "exit from unknown endpoint"),
            },
            Err(e) => debug!(%from, "malformed datagram: {e}"),
        }
    }
    Ok(())
}

/// The server side of the three-way handshake: ACK the REGISTER, block for
/// the confirmation on the same socket, then final-ACK and insert into the
/// registry. Any validation failure abandons the handshake without touching
/// the registry.
fn handle_registration(
    sock: &UdpSocket,
    state: &ServerState,
    seq: u16,
    agent: AgentId,
    from: SocketAddr,
) -> io::Result<()> {
    info!(%agent, %from, "registration attempt");
    sock.send_to(&encode_handshake_ack(seq, agent), from)?;

    sock.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let mut buf = [0u8; MAX_DATAGRAM];
    let confirmation = sock.recv_from(&mut buf);
    sock.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;

    let Ok((len, _peer)) = confirmation else {
        warn!(%agent, %from, "no handshake confirmation");
        return Ok(());
    };
    match ServerBound::decode(&buf[..len]) {
        Ok(ServerBound::Ack(ack)) if ack.agent == Some(agent) => {
            state.registry.lock().insert(agent, from);
            sock.send_to(&encode_handshake_ack(ack.seq, agent), from)?;
            info!(%agent, %from, "agent registered");
        }
        Ok(other) => warn!(%agent, %from, "invalid handshake confirmation: {other:?}"),
        Err(e) => warn!(%agent, %from, "malformed handshake confirmation: {e}"),
    }
    Ok(())
}
