//! The agent's NetTask endpoint: the datagram receive loop and the reliable
//! result-submission helper.
//!
//! The receive loop owns all reads on the shared socket. Task-level ACKs it
//! observes are routed through a channel to [`submit_result`], which runs on
//! the measurement engine's thread; this keeps a single reader on the socket
//! while the engine blocks on its own submissions.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use nettask_proto::constants::{
    MAX_DATAGRAM, MIN_ACK_PDU, RECV_POLL_TIMEOUT, SUBMIT_ACK_TIMEOUT, SUBMIT_ATTEMPTS,
};
use nettask_proto::{encode_result, encode_task_ack, AgentBound, AgentId, Task};
use nettask_sequenced::{InboundSequencer, SequenceVerdict, SequencedError};
use tracing::{debug, info, trace, warn};

/// Runs the datagram receive loop: enforces sequence ordering on incoming
/// tasks, acknowledges them, and hands them to the measurement engine in
/// arrival order through `task_tx`. Loose ACKs go out on `ack_tx`.
pub fn run_receive_loop(
    sock: &UdpSocket,
    task_tx: &mpsc::Sender<Task>,
    ack_tx: &mpsc::Sender<u16>,
    running: &AtomicBool,
) -> io::Result<()> {
    let mut sequencer = InboundSequencer::new();
    let mut buf = [0u8; MAX_DATAGRAM];
    sock.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;

    while running.load(Ordering::Relaxed) {
        let (len, from) = match sock.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                trace!("still waiting for tasks");
                continue;
            }
            Err(e) => return Err(e),
        };
        if len < MIN_ACK_PDU {
            debug!(%from, len, "runt datagram ignored");
            continue;
        }
        match AgentBound::decode(&buf[..len]) {
            Ok(AgentBound::Task { seq, task }) => match sequencer.check(seq) {
                SequenceVerdict::Accept => {
                    sock.send_to(&encode_task_ack(seq), from)?;
                    sequencer.advance();
                    info!(seq, task_id = task.task_id, "task accepted");
                    if task_tx.send(task).is_err() {
                        break;
                    }
                }
                SequenceVerdict::Duplicate => {
                    // The server missed our ACK; repeat it, do not reprocess.
                    debug!(seq, "duplicate task re-acknowledged");
                    sock.send_to(&encode_task_ack(seq), from)?;
                }
                SequenceVerdict::Ahead => warn!(
                    seq,
                    expected = sequencer.expected(),
                    "task ahead of expected sequence, discarded"
                ),
            },
            Ok(AgentBound::Ack(ack)) => {
                let _ = ack_tx.send(ack.seq);
            }
            Err(e) => debug!(%from, "malformed datagram: {e}"),
        }
    }
    Ok(())
}

/// Encodes and transmits one RESULT, then waits for the server's echo ACK
/// (sequence field = task id) routed back from the receive loop. Retries
/// within the attempt budget; exhaustion is reported to the caller, never
/// fatal.
pub fn submit_result(
    sock: &UdpSocket,
    server: SocketAddr,
    agent: AgentId,
    task_id: u16,
    result: &str,
    ack_rx: &mpsc::Receiver<u16>,
) -> Result<(), SequencedError> {
    let pdu = encode_result(task_id, agent, result);

    // Acks from earlier submissions are stale by definition.
    while ack_rx.try_recv().is_ok() {}

    for attempt in 1..=SUBMIT_ATTEMPTS {
        if let Err(e) = sock.send_to(&pdu, server) {
            warn!(task_id, attempt, "result send failed: {e}");
            continue;
        }
        let deadline = Instant::now() + SUBMIT_ACK_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match ack_rx.recv_timeout(remaining) {
                Ok(seq) if seq == task_id => {
                    debug!(task_id, attempt, "result acknowledged");
                    return Ok(());
                }
                Ok(stale) => trace!(stale, "ignoring unrelated ack"),
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(SequencedError::AckTimeout(SUBMIT_ACK_TIMEOUT));
                }
            }
        }
        debug!(task_id, attempt, "no ack within {SUBMIT_ACK_TIMEOUT:?}, retrying");
    }
    Err(SequencedError::Exhausted { seq: task_id, attempts: SUBMIT_ATTEMPTS })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nettask_proto::{encode_task, ServerBound, TaskData, TaskType};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn sample_task(task_id: u16) -> Task {
        Task {
            task_id,
            task_type: TaskType::Cpu,
            interface_check: String::new(),
            data: TaskData::Text(String::new()),
            frequency: 1,
            duration: 1,
        }
    }

    struct LoopHarness {
        server: UdpSocket,
        agent_addr: SocketAddr,
        task_rx: mpsc::Receiver<Task>,
        running: Arc<AtomicBool>,
        handle: thread::JoinHandle<()>,
    }

    impl LoopHarness {
        fn start() -> Self {
            let agent_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
            let server = UdpSocket::bind("127.0.0.1:0").unwrap();
            server.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
            let agent_addr = agent_sock.local_addr().unwrap();

            let (task_tx, task_rx) = mpsc::channel();
            let (ack_tx, _ack_rx) = mpsc::channel();
            let running = Arc::new(AtomicBool::new(true));
            let loop_running = running.clone();
            let handle = thread::spawn(move || {
                run_receive_loop(&agent_sock, &task_tx, &ack_tx, &loop_running).unwrap();
            });

            Self { server, agent_addr, task_rx, running, handle }
        }

        fn expect_ack(&self, seq: u16) {
            let mut buf = [0u8; MAX_DATAGRAM];
            let (len, _) = self.server.recv_from(&mut buf).unwrap();
            match ServerBound::decode(&buf[..len]).unwrap() {
                ServerBound::Ack(ack) => assert_eq!(ack.seq, seq),
                other => panic!("expected ACK, got {:?}", other),
            }
        }

        fn stop(self) {
            self.running.store(false, Ordering::Relaxed);
            self.handle.join().unwrap();
        }
    }

    #[test]
    fn test_in_order_task_is_acked_and_forwarded() {
        let harness = LoopHarness::start();

        let pdu = encode_task(1, &sample_task(42));
        harness.server.send_to(&pdu, harness.agent_addr).unwrap();

        harness.expect_ack(1);
        let task = harness.task_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(task.task_id, 42);

        harness.stop();
    }

    #[test]
    fn test_duplicate_is_reacked_but_not_reprocessed() {
        let harness = LoopHarness::start();

        let pdu = encode_task(1, &sample_task(42));
        harness.server.send_to(&pdu, harness.agent_addr).unwrap();
        harness.expect_ack(1);
        harness.task_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        // Retransmission of the delivered task.
        harness.server.send_to(&pdu, harness.agent_addr).unwrap();
        harness.expect_ack(1);
        assert!(harness.task_rx.recv_timeout(Duration::from_millis(300)).is_err());

        harness.stop();
    }

    #[test]
    fn test_ahead_sequence_is_discarded_without_ack() {
        let harness = LoopHarness::start();

        let pdu = encode_task(5, &sample_task(42));
        harness.server.send_to(&pdu, harness.agent_addr).unwrap();

        let mut buf = [0u8; MAX_DATAGRAM];
        assert!(harness.server.recv_from(&mut buf).is_err());
        assert!(harness.task_rx.recv_timeout(Duration::from_millis(100)).is_err());

        harness.stop();
    }

    #[test]
    fn test_submit_result_retries_until_acked() {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = server.local_addr().unwrap();

        let (ack_tx, ack_rx) = mpsc::channel();
        let script = thread::spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            // Ignore the first transmission, answer the second.
            server.recv_from(&mut buf).unwrap();
            let (len, _) = server.recv_from(&mut buf).unwrap();
            match ServerBound::decode(&buf[..len]).unwrap() {
                ServerBound::Result { task_id, payload, .. } => {
                    assert_eq!(payload, "42 ms");
                    ack_tx.send(task_id).unwrap();
                }
                other => panic!("expected RESULT, got {:?}", other),
            }
        });

        submit_result(
            &sock,
            server_addr,
            AgentId::from_host("A01"),
            7,
            "42 ms",
            &ack_rx,
        )
        .unwrap();
        script.join().unwrap();
    }

    #[test]
    fn test_submit_result_exhausts_without_ack() {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        let (_ack_tx, ack_rx) = mpsc::channel::<u16>();

        let err = submit_result(
            &sock,
            sink.local_addr().unwrap(),
            AgentId::from_host("A01"),
            7,
            "42 ms",
            &ack_rx,
        )
        .unwrap_err();
        assert_eq!(err, SequencedError::Exhausted { seq: 7, attempts: SUBMIT_ATTEMPTS });
    }
}
