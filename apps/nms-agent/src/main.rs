use std::error::Error;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use clap::Parser;
use nettask_proto::constants::{ALERTFLOW_PORT, DEFAULT_SERVER_HOST, NETTASK_PORT};
use nettask_proto::encode_exit;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod alert;
mod config;
mod endpoint;
mod engine;
mod error;
mod handshake;
mod identity;
mod logs;
mod menu;
mod probe;

use alert::ThresholdEvaluator;
use logs::AgentLogs;

/// NMS Agent - registers with the server, runs measurement tasks and raises
/// threshold alerts.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// NetTask server address
    #[arg(long, default_value_t = format!("{DEFAULT_SERVER_HOST}:{NETTASK_PORT}"))]
    server: String,

    /// AlertFlow server address (defaults to the NetTask host on the alert port)
    #[arg(long)]
    alert_server: Option<String>,

    /// Threshold configuration file
    #[arg(long, default_value = "thresholds.json")]
    config: PathBuf,

    /// Agent identifier (defaults to the first three characters of the host name)
    #[arg(long)]
    agent_id: Option<String>,
}

fn resolve(addr: &str) -> Result<SocketAddr, Box<dyn Error>> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("address {addr} did not resolve").into())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let server = resolve(&args.server)?;
    let alert_server = match &args.alert_server {
        Some(addr) => resolve(addr)?,
        None => SocketAddr::new(server.ip(), ALERTFLOW_PORT),
    };

    let thresholds = config::load(&args.config)?;
    let agent = identity::derive(args.agent_id.as_deref());
    info!(%agent, %server, "starting agent");

    let sock = UdpSocket::bind(("0.0.0.0", 0))?;
    handshake::register(&sock, server, agent)?;

    let logs = Arc::new(AgentLogs::default());
    let running = Arc::new(AtomicBool::new(true));
    let (task_tx, task_rx) = mpsc::channel();
    let (ack_tx, ack_rx) = mpsc::channel();

    let recv_sock = sock.try_clone()?;
    let recv_running = running.clone();
    let receiver = thread::spawn(move || {
        if let Err(e) = endpoint::run_receive_loop(&recv_sock, &task_tx, &ack_tx, &recv_running) {
            error!("receive loop failed: {e}");
        }
    });

    let engine = engine::Engine::new(
        sock.try_clone()?,
        server,
        alert_server,
        agent,
        ThresholdEvaluator::new(thresholds),
        logs.clone(),
        ack_rx,
    );
    let engine_running = running.clone();
    let worker = thread::spawn(move || engine.run(task_rx, &engine_running));

    let menu_result = menu::run(&logs);

    info!("shutting down");
    let _ = sock.send_to(&encode_exit(), server);
    running.store(false, Ordering::Relaxed);
    let _ = receiver.join();
    let _ = worker.join();
    menu_result?;
    Ok(())
}
