//! Lifecycle of the UDP bandwidth collector subprocess.

use std::io;
use std::process::{Child, Command, Stdio};

use tracing::{info, warn};

/// Handle on the `iperf -s -u` collector the server keeps alive for
/// bandwidth tasks. The server cannot serve them without it, so a spawn
/// failure is fatal to startup.
pub struct BandwidthCollector {
    child: Child,
}

impl BandwidthCollector {
    pub fn spawn() -> io::Result<Self> {
        let child = Command::new("iperf")
            .args(["-s", "-u"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        info!(pid = child.id(), "bandwidth collector started");
        Ok(Self { child })
    }

    pub fn shutdown(mut self) {
        if let Err(e) = self.child.kill() {
            warn!("bandwidth collector kill failed: {e}");
        }
        let _ = self.child.wait();
        info!("bandwidth collector stopped");
    }
}
