//! Wire and timing constants for the NetTask and AlertFlow protocols.

use std::time::Duration;

// --- Transport ---

/// Default UDP port of the NetTask service.
pub const NETTASK_PORT: u16 = 5005;

/// Default TCP port of the AlertFlow service.
pub const ALERTFLOW_PORT: u16 = 5006;

/// Default server host for both services.
pub const DEFAULT_SERVER_HOST: &str = "10.0.4.10";

/// Receive buffer and maximum datagram size for NetTask (bytes).
pub const MAX_DATAGRAM: usize = 1024;

/// Maximum AlertFlow payload read per connection (bytes).
pub const MAX_ALERT_LEN: usize = 1024;

// --- Wire format ---

/// Width of an agent identifier on the wire (bytes).
pub const AGENT_ID_LEN: usize = 3;

/// Smallest task-level acknowledgement: type byte plus a sequence number.
pub const MIN_ACK_PDU: usize = 3;

/// A handshake PDU (REGISTER or handshake ACK): type, sequence, agent id.
pub const HANDSHAKE_PDU_LEN: usize = 6;

/// Smallest well-formed TASK PDU: header plus the frequency and duration
/// trailer, with empty interface and data fields.
pub const MIN_TASK_PDU: usize = 9;

/// Smallest RESULT PDU: type, task id, agent id, empty payload.
pub const MIN_RESULT_PDU: usize = 6;

// --- Retry budgets and timing ---

/// Attempt budget for task dispatch (Server to Agent).
pub const DISPATCH_ATTEMPTS: u8 = 3;

/// Attempt budget for result submission (Agent to Server).
pub const SUBMIT_ATTEMPTS: u8 = 3;

/// How long the dispatcher waits for a task-level ACK per attempt.
pub const DISPATCH_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the result submitter waits for its echo ACK per attempt.
pub const SUBMIT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Bounded wait for each step of the registration handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Socket poll timeout for the datagram receive loops on both sides.
pub const RECV_POLL_TIMEOUT: Duration = Duration::from_secs(1);

// --- Measurement ---

/// Interval between periodic CPU/RAM samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum gap between repeated alerts for the same metric.
pub const ALERT_COOLDOWN: Duration = Duration::from_secs(5);

/// Wall-clock window of a bandwidth probe (seconds).
pub const BANDWIDTH_WINDOW_SECS: u8 = 10;
