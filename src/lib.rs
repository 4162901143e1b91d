/// cmdlink core - command/response correlation over a single-peer UDP link
///
/// The remote device answers each text command with a short datagram, but
/// the link carries no request IDs and may drop or reorder anything. This
/// crate pairs every command with the next reply:
/// - a background listener drains the socket into a latest-wins slot
/// - `send_and_wait` clears the slot, sends, and waits with a deadline
/// - a missing reply is `Ok(None)`, never an error
///
/// # Design Principles
/// - One outstanding command at a time, enforced by an internal lock
/// - No framing: payloads go out and come back byte-for-byte
/// - All state lives in a `Session`; logging goes through `tracing`

pub mod errors;
pub mod contracts;
pub mod config;
pub mod slot;
pub mod transmitter;
pub mod receiver;
pub mod correlator;
pub mod session;

pub use config::{LinkConfig, ShutdownPolicy, WaitPolicy};
pub use contracts::{Command, Endpoint, ListenerState, Reply};
pub use errors::{LinkError, Result};
pub use session::Session;

/// Default UDP port on both ends of the link
pub const DEFAULT_PORT: u16 = 8889;

/// Maximum command size (in bytes) - one datagram, well under the MTU
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Receive buffer size for inbound replies
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 3000;

/// Reply wait granularity in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

/// Reply wait length in poll intervals (1.5 s with the default interval)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Listener shutdown grace in poll intervals
pub const DEFAULT_SHUTDOWN_POLLS: u32 = 32;
