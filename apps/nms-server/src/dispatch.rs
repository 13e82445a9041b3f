//! Pushes queued tasks to their agents with bounded retries.
//!
//! Dispatch runs on the menu thread while the receive loop owns the socket
//! reads; the loop mirrors every observed ACK into a channel that the
//! dispatcher blocks on here.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc;
use std::time::Instant;

use nettask_proto::constants::{DISPATCH_ACK_TIMEOUT, DISPATCH_ATTEMPTS};
use nettask_proto::{encode_task_ack, AgentId};
use nettask_sequenced::{PendingTask, SequencedError, TaskDispatch};
use tracing::{debug, info, trace, warn};

use crate::endpoint::ServerState;

/// Drains every registered agent's pending queue, in FIFO order per agent.
pub fn dispatch_pending(
    sock: &UdpSocket,
    state: &ServerState,
    ack_rx: &mpsc::Receiver<(SocketAddr, u16)>,
) -> io::Result<()> {
    let agents = state.registry.lock().snapshot();
    if agents.is_empty() {
        println!("Nenhum agente registrado para enviar tarefas.");
        return Ok(());
    }

    for (agent, _entry) in agents {
        let mut dispatched = 0usize;
        loop {
            // Re-resolve the endpoint per task; the agent may have exited
            // while earlier tasks were in flight.
            let Some(addr) = state.registry.lock().addr_of(agent) else {
                warn!(%agent, "agent left during dispatch");
                break;
            };
            let Some(pending) = state.outbound.lock().pop_next(agent) else {
                break;
            };
            dispatched += 1;
            dispatch_one(sock, addr, agent, pending, ack_rx)?;
        }
        if dispatched == 0 {
            println!("Nenhuma tarefa pendente para o Agente {agent}.");
        }
    }
    Ok(())
}

fn dispatch_one(
    sock: &UdpSocket,
    addr: SocketAddr,
    agent: AgentId,
    pending: PendingTask,
    ack_rx: &mpsc::Receiver<(SocketAddr, u16)>,
) -> io::Result<()> {
    // Acks from earlier exchanges are stale by definition.
    while ack_rx.try_recv().is_ok() {}

    let mut dispatch = TaskDispatch::new(pending);
    while dispatch.begin_attempt(DISPATCH_ATTEMPTS) {
        sock.send_to(dispatch.pdu(), addr)?;
        debug!(%agent, seq = dispatch.seq(), state = ?dispatch.state(), "task transmitted");

        let deadline = Instant::now() + DISPATCH_ACK_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match ack_rx.recv_timeout(remaining) {
                Ok((peer, seq)) => {
                    if peer == addr && dispatch.on_ack(seq) {
                        // Close the exchange with the confirming ACK.
                        sock.send_to(&encode_task_ack(seq), addr)?;
                        info!(%agent, seq, task_id = dispatch.task_id(), "task delivered");
                        return Ok(());
                    }
                    trace!(%peer, seq, "ignoring unrelated ack");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    warn!("receive loop gone, abandoning dispatch");
                    return Ok(());
                }
            }
        }
        warn!(%agent, seq = dispatch.seq(), "no ack, retrying");
    }

    warn!(
        %agent,
        "{}",
        SequencedError::Exhausted { seq: dispatch.seq(), attempts: DISPATCH_ATTEMPTS }
    );
    Ok(())
}
