//! The AlertFlow listener: one alert per connection, read up to 1 KiB,
//! print with a wall-clock stamp, close. No acknowledgement.

use std::io::{self, Read};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Local;
use nettask_proto::constants::{MAX_ALERT_LEN, RECV_POLL_TIMEOUT};
use tracing::{info, warn};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

pub fn run_alert_listener(listener: &TcpListener, running: &AtomicBool) -> io::Result<()> {
    listener.set_nonblocking(true)?;

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((mut conn, peer)) => {
                conn.set_nonblocking(false)?;
                conn.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;

                let mut buf = [0u8; MAX_ALERT_LEN];
                match conn.read(&mut buf) {
                    Ok(0) => {}
                    Ok(len) => {
                        let text = String::from_utf8_lossy(&buf[..len]);
                        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
                        println!("[{stamp} ALERTA] {text}");
                        info!(target: "alertflow", %peer, "alert received: {text}");
                    }
                    Err(e) => warn!(target: "alertflow", %peer, "alert read failed: {e}"),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!(target: "alertflow", "accept failed: {e}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    Ok(())
}
