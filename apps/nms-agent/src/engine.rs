//! The measurement engine: consumes tasks from the receive loop, runs the
//! matching probe, and pushes results back through the reliable submitter.
//!
//! Tasks run strictly one at a time on the engine thread; the sequence
//! acceptance rule upstream keeps the server from overrunning the queue.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nettask_proto::constants::{BANDWIDTH_WINDOW_SECS, RECV_POLL_TIMEOUT, SAMPLE_INTERVAL};
use nettask_proto::{AgentId, Task, TaskData, TaskType};
use tracing::{debug, info, warn};

use crate::alert::{self, ThresholdEvaluator};
use crate::endpoint;
use crate::logs::AgentLogs;
use crate::probe::{self, SystemSampler};

/// The two periodically sampled metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cpu,
    Ram,
}

impl Metric {
    fn reading(self, value: f64) -> String {
        match self {
            Metric::Cpu => format!("Percentagem de uso da CPU: {value:.2}%"),
            Metric::Ram => format!("Percentagem de uso da RAM: {value:.2}%"),
        }
    }
}

pub struct Engine {
    sock: UdpSocket,
    server: SocketAddr,
    alert_server: SocketAddr,
    agent: AgentId,
    evaluator: ThresholdEvaluator,
    logs: Arc<AgentLogs>,
    ack_rx: mpsc::Receiver<u16>,
}

impl Engine {
    pub fn new(
        sock: UdpSocket,
        server: SocketAddr,
        alert_server: SocketAddr,
        agent: AgentId,
        evaluator: ThresholdEvaluator,
        logs: Arc<AgentLogs>,
        ack_rx: mpsc::Receiver<u16>,
    ) -> Self {
        Self { sock, server, alert_server, agent, evaluator, logs, ack_rx }
    }

    /// Drains the task queue until the agent shuts down.
    pub fn run(mut self, task_rx: mpsc::Receiver<Task>, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            match task_rx.recv_timeout(RECV_POLL_TIMEOUT) {
                Ok(task) => self.execute(task, running),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn execute(&mut self, task: Task, running: &AtomicBool) {
        info!(task_id = task.task_id, task_type = ?task.task_type, "task started");

        if !task.interface_check.is_empty() && !probe::interface_present(&task.interface_check) {
            let text = format!("Falha: interface {} indisponivel", task.interface_check);
            self.finish(task.task_id, text);
            return;
        }

        match task.task_type {
            TaskType::Cpu => self.run_periodic(&task, Metric::Cpu, running),
            TaskType::Ram => self.run_periodic(&task, Metric::Ram, running),
            TaskType::Latency | TaskType::Jitter | TaskType::PacketLoss => self.run_ping(&task),
            TaskType::Bandwidth => self.run_bandwidth(&task),
        }
        debug!(task_id = task.task_id, "task done");
    }

    /// Records a result locally and submits it to the server.
    fn finish(&mut self, task_id: u16, text: String) {
        self.logs.push_result(&text);
        if let Err(e) =
            endpoint::submit_result(&self.sock, self.server, self.agent, task_id, &text, &self.ack_rx)
        {
            warn!(task_id, "result submission failed: {e}");
        }
    }

    /// Samples the metric once a second; every `frequency` samples the mean
    /// is emitted as one result, until `duration` seconds elapse.
    fn run_periodic(&mut self, task: &Task, metric: Metric, running: &AtomicBool) {
        let batch = usize::from(task.frequency.max(1));
        let window = Duration::from_secs(u64::from(task.duration));
        let started = Instant::now();
        let mut sampler = SystemSampler::new();
        let mut samples = Vec::with_capacity(batch);

        while started.elapsed() < window && running.load(Ordering::Relaxed) {
            samples.push(match metric {
                Metric::Cpu => sampler.cpu_percent(),
                Metric::Ram => sampler.ram_percent(),
            });

            if samples.len() == batch {
                let mean = samples.iter().sum::<f64>() / samples.len() as f64;
                let reading = metric.reading(mean);
                self.finish(task.task_id, reading.clone());
                if let Some(alert) = self.evaluator.evaluate(metric, mean, &reading, Instant::now())
                {
                    self.logs.push_alert(&alert);
                    alert::send_alert(self.alert_server, &alert);
                }
                samples.clear();
            }
            thread::sleep(SAMPLE_INTERVAL);
        }
    }

    fn run_ping(&mut self, task: &Task) {
        let text = match &task.data {
            TaskData::Target(target) => match probe::ping(*target, task.frequency.max(1)) {
                Ok(stats) => match task.task_type {
                    TaskType::Latency => format!("{} ms", stats.avg_rtt_ms),
                    TaskType::Jitter => format!("{:.3} ms", stats.max_jitter_ms()),
                    TaskType::PacketLoss => format!("{}%", stats.loss_pct),
                    _ => unreachable!("run_ping only handles ping-based tasks"),
                },
                Err(e) => format!("Falha na sonda ICMP: {e}"),
            },
            TaskData::Text(_) => "Falha: tarefa de sonda sem endereco de destino".to_owned(),
        };
        self.finish(task.task_id, text);
    }

    fn run_bandwidth(&mut self, task: &Task) {
        // The collector endpoint is preconfigured: the server runs it.
        let text = match probe::bandwidth(self.server.ip(), BANDWIDTH_WINDOW_SECS) {
            Ok(rate) => rate,
            Err(e) => format!("Falha na sonda de largura de banda: {e}"),
        };
        self.finish(task.task_id, text);
    }
}
