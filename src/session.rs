/// Session lifecycle - bind, listener start/stop, init and teardown
///
/// A `Session` owns everything for one controller/device pairing. There is
/// no global state; several sessions can coexist on different local ports.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{LinkConfig, WaitPolicy};
use crate::contracts::{Command, Endpoint, ListenerState, Reply};
use crate::correlator::Correlator;
use crate::errors::{LinkError, Result};
use crate::receiver::Listener;
use crate::slot::ResponseSlot;
use crate::transmitter;

/// Live parts of an open session; dropped as a whole on close
struct Link {
    correlator: Correlator,
    stop: watch::Sender<bool>,
    listener: JoinHandle<()>,
}

pub struct Session {
    config: LinkConfig,
    local: Endpoint,
    link: Option<Link>,
    state: watch::Receiver<ListenerState>,
}

impl Session {
    /// Bind, start the listener and run the init command sequence
    ///
    /// # Errors
    /// - `LinkError::Config` if `config` does not validate
    /// - `LinkError::Bind` if the local endpoint cannot be bound
    /// - `LinkError::Transport` if an init command cannot be sent
    ///
    /// An init command that gets no reply is logged and skipped.
    pub async fn open(config: LinkConfig) -> Result<Self> {
        config.validate()?;

        let socket = transmitter::bind(config.local).await?;
        let local = Endpoint::from(socket.local_addr()?);
        let socket = Arc::new(socket);
        let slot = Arc::new(ResponseSlot::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ListenerState::Running);

        let listener = Listener::new(
            Arc::clone(&socket),
            config.remote,
            Arc::clone(&slot),
            stop_rx,
            state_tx,
        )
        .with_buffer_size(config.max_datagram_size)
        .with_accept_any_source(config.accept_any_source)
        .spawn();

        info!(event = "session_open", local = %local, remote = %config.remote);

        let mut session = Self {
            link: Some(Link {
                correlator: Correlator::new(socket, config.remote, slot),
                stop: stop_tx,
                listener,
            }),
            config,
            local,
            state: state_rx,
        };

        let init: Vec<Command> = session.config.init_sequence().collect();
        for command in init {
            match session.send_command(&command).await {
                Ok(Some(_)) => {}
                Ok(None) => warn!(event = "init_no_reply", command = %command),
                Err(e) => {
                    session.close().await;
                    return Err(e);
                }
            }
        }

        Ok(session)
    }

    /// Open with default policies between two endpoints
    pub async fn connect(local: Endpoint, remote: Endpoint) -> Result<Self> {
        Self::open(LinkConfig::new(local, remote)).await
    }

    /// Send `command` and wait for its reply under `policy`
    ///
    /// # Errors
    /// Returns `LinkError::Closed` after `close()`, otherwise see
    /// [`Correlator::send_and_wait`]
    pub async fn send_and_wait(&self, command: &Command, policy: WaitPolicy) -> Result<Option<Reply>> {
        let link = self.link.as_ref().ok_or(LinkError::Closed)?;
        link.correlator.send_and_wait(command, policy).await
    }

    /// Send `command` using the configured wait policy
    pub async fn send_command(&self, command: &Command) -> Result<Option<Reply>> {
        self.send_and_wait(command, self.config.wait).await
    }

    pub async fn takeoff(&self) -> Result<Option<Reply>> {
        self.send_command(&Command::takeoff()).await
    }

    pub async fn land(&self) -> Result<Option<Reply>> {
        self.send_command(&Command::land()).await
    }

    /// Stop the listener and release the socket
    ///
    /// Waits up to the configured grace period for the listener to finish,
    /// then aborts it. Calling this on a closed session does nothing.
    pub async fn close(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };

        link.stop.send_replace(true);
        let grace = self.config.shutdown.grace();
        match tokio::time::timeout(grace, &mut link.listener).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(event = "listener_join_error", error = %e),
            Err(_) => {
                warn!(event = "listener_abort", grace_ms = grace.as_millis() as u64);
                link.listener.abort();
            }
        }

        info!(event = "session_close", local = %self.local, remote = %self.config.remote);
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn local_endpoint(&self) -> Endpoint {
        self.local
    }

    pub fn remote_endpoint(&self) -> Endpoint {
        self.config.remote
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Current state of the listener loop
    ///
    /// Always `Stopped` once the session is closed, including when the
    /// listener was aborted before it could publish its final state.
    pub fn listener_state(&self) -> ListenerState {
        if self.link.is_none() {
            return ListenerState::Stopped;
        }
        *self.state.borrow()
    }

    /// False once the listener has stopped; later commands can only time out
    pub fn is_listener_healthy(&self) -> bool {
        self.listener_state().is_running()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.stop.send_replace(true);
            link.listener.abort();
        }
    }
}
