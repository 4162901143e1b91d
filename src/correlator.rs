/// Correlator - pairs each sent command with the next reply
///
/// The link carries no request IDs, so pairing relies on exchanges never
/// overlapping: the slot is cleared before the send, the next reply that
/// lands in it is taken as the answer, and the slot is cleared again on the
/// way out. An internal lock serializes callers so that holds even when the
/// session is shared between tasks.
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::WaitPolicy;
use crate::contracts::{Command, Endpoint, Reply};
use crate::errors::Result;
use crate::slot::ResponseSlot;
use crate::transmitter::Transmitter;

pub struct Correlator {
    socket: Arc<UdpSocket>,
    remote: Endpoint,
    slot: Arc<ResponseSlot>,
    exchange: Mutex<()>,
}

impl Correlator {
    pub fn new(socket: Arc<UdpSocket>, remote: Endpoint, slot: Arc<ResponseSlot>) -> Self {
        Self {
            socket,
            remote,
            slot,
            exchange: Mutex::new(()),
        }
    }

    /// Send `command` and wait up to `policy.deadline()` for the reply
    ///
    /// # Returns
    /// `Some(reply)` with the payload exactly as received, or `None` if
    /// nothing arrived in time. The command is never resent.
    ///
    /// # Errors
    /// Returns `LinkError::Transport` if the send fails and
    /// `LinkError::PayloadTooLarge` for oversized commands
    pub async fn send_and_wait(&self, command: &Command, policy: WaitPolicy) -> Result<Option<Reply>> {
        let _exchange = self.exchange.lock().await;

        self.slot.clear();
        info!(event = "send_command", command = %command);
        Transmitter::send(&self.socket, command, self.remote).await?;

        let reply = match self.slot.wait(policy.deadline()).await {
            Some(_) => self.slot.take(),
            None => None,
        };
        self.slot.clear();

        if reply.is_none() {
            warn!(
                event = "timeout",
                command = %command,
                waited_ms = policy.deadline().as_millis() as u64
            );
        }
        Ok(reply)
    }

    #[cfg(test)]
    pub(crate) fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }
}
