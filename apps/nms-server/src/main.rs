use std::error::Error;
use std::net::{TcpListener, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod alerts;
mod bandwidth;
mod dispatch;
mod endpoint;
mod error;
mod menu;
mod registry;
mod store;
mod tasks;

use bandwidth::BandwidthCollector;
use endpoint::ServerState;

/// NMS Server - dispatches measurement tasks over NetTask, collects results
/// and listens for AlertFlow alerts.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP bind address of the NetTask endpoint
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// TCP bind address of the AlertFlow listener
    #[arg(long, default_value = "0.0.0.0:5006")]
    alert_bind: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let collector = match BandwidthCollector::spawn() {
        Ok(collector) => collector,
        Err(e) => {
            error!("bandwidth collector could not be started: {e}");
            std::process::exit(1);
        }
    };

    let sock = UdpSocket::bind(&args.bind)?;
    let listener = TcpListener::bind(&args.alert_bind)?;
    info!(nettask = %args.bind, alertflow = %args.alert_bind, "server listening");

    let state = Arc::new(ServerState::new());
    let running = Arc::new(AtomicBool::new(true));
    let (ack_tx, ack_rx) = mpsc::channel();

    let recv_sock = sock.try_clone()?;
    let recv_state = state.clone();
    let recv_running = running.clone();
    let receiver = thread::spawn(move || {
        if let Err(e) = endpoint::run_receive_loop(&recv_sock, &recv_state, &ack_tx, &recv_running)
        {
            error!("receive loop failed: {e}");
        }
    });

    let alert_running = running.clone();
    let alert_listener = thread::spawn(move || {
        if let Err(e) = alerts::run_alert_listener(&listener, &alert_running) {
            error!(target: "alertflow", "alert listener failed: {e}");
        }
    });

    let menu_result = menu::run(&sock, &state, &ack_rx);

    running.store(false, Ordering::Relaxed);
    let _ = receiver.join();
    let _ = alert_listener.join();
    collector.shutdown();
    menu_result?;
    Ok(())
}
