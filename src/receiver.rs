/// Receiver module - the listener loop
///
/// A background task drains the session socket into the response slot until
/// it is told to stop or the socket fails. Receive errors are terminal for
/// the loop; there is no restart.
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use crate::contracts::{Endpoint, ListenerState, Reply};
use crate::errors::LinkError;
use crate::slot::ResponseSlot;

/// Everything the listener task needs, moved into it at spawn time
pub struct Listener {
    socket: Arc<UdpSocket>,
    remote: Endpoint,
    slot: Arc<ResponseSlot>,
    stop: watch::Receiver<bool>,
    state: watch::Sender<ListenerState>,
    buffer_size: usize,
    accept_any_source: bool,
}

impl Listener {
    pub fn new(
        socket: Arc<UdpSocket>,
        remote: Endpoint,
        slot: Arc<ResponseSlot>,
        stop: watch::Receiver<bool>,
        state: watch::Sender<ListenerState>,
    ) -> Self {
        Self {
            socket,
            remote,
            slot,
            stop,
            state,
            buffer_size: crate::DEFAULT_RECV_BUFFER_SIZE,
            accept_any_source: false,
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_accept_any_source(mut self, accept: bool) -> Self {
        self.accept_any_source = accept;
        self
    }

    /// Spawn the loop on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        let span = info_span!("listener", remote = %self.remote);
        tokio::spawn(self.run().instrument(span))
    }

    fn publish(&self, state: ListenerState) {
        self.state.send_replace(state);
        debug!(event = "listener_state", state = %state);
    }

    async fn run(mut self) {
        let mut buf = vec![0u8; self.buffer_size];
        self.publish(ListenerState::Running);

        loop {
            if *self.stop.borrow() {
                self.publish(ListenerState::Stopping);
                break;
            }

            tokio::select! {
                biased;

                changed = self.stop.changed() => {
                    // A dropped sender means the session is gone.
                    if changed.is_err() {
                        self.publish(ListenerState::Stopping);
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((n, from)) => {
                        let from = Endpoint::from(from);
                        if !self.accept_any_source && from != self.remote {
                            debug!(event = "receive_ignored", source = %from, bytes = n);
                            continue;
                        }
                        let reply = Reply::from(&buf[..n]);
                        info!(event = "receive", payload = %reply.to_text_lossy(), bytes = n);
                        self.slot.write(reply);
                    }
                    Err(e) => {
                        let fault = LinkError::Receive(e.to_string());
                        error!(event = "receive_error", error = %fault);
                        break;
                    }
                },
            }
        }

        self.publish(ListenerState::Stopped);
        info!(event = "listener_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Harness {
        device: UdpSocket,
        socket: Arc<UdpSocket>,
        session_addr: std::net::SocketAddr,
        slot: Arc<ResponseSlot>,
        stop: watch::Sender<bool>,
        state: watch::Receiver<ListenerState>,
        handle: JoinHandle<()>,
    }

    async fn start(accept_any_source: bool) -> Harness {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let session_addr = socket.local_addr().unwrap();
        let slot = Arc::new(ResponseSlot::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ListenerState::Running);

        let handle = Listener::new(
            Arc::clone(&socket),
            Endpoint::from(device.local_addr().unwrap()),
            Arc::clone(&slot),
            stop_rx,
            state_tx,
        )
        .with_accept_any_source(accept_any_source)
        .spawn();

        Harness {
            device,
            socket,
            session_addr,
            slot,
            stop: stop_tx,
            state: state_rx,
            handle,
        }
    }

    #[tokio::test]
    async fn test_latest_datagram_wins() {
        let h = start(false).await;
        h.device.send_to(b"one", h.session_addr).await.unwrap();
        h.device.send_to(b"two", h.session_addr).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.slot.peek().unwrap().as_bytes(), b"two");
        assert_eq!(*h.state.borrow(), ListenerState::Running);
    }

    #[tokio::test]
    async fn test_foreign_source_filtered_unless_accepted() {
        let h = start(false).await;
        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        stranger.send_to(b"spoof", h.session_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.slot.peek(), None);

        let open = start(true).await;
        stranger.send_to(b"hello", open.session_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(open.slot.peek().unwrap().as_bytes(), b"hello");
    }

    #[tokio::test]
    async fn test_stop_interrupts_blocked_receive() {
        let mut h = start(false).await;
        h.stop.send_replace(true);

        tokio::time::timeout(Duration::from_secs(1), &mut h.handle)
            .await
            .expect("listener should stop promptly")
            .unwrap();
        assert_eq!(*h.state.borrow(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_dropped_stop_sender_ends_loop() {
        let Harness { stop, state, handle, .. } = start(false).await;
        drop(stop);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should stop promptly")
            .unwrap();
        assert_eq!(*state.borrow(), ListenerState::Stopped);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_receive_error_stops_loop() {
        let mut h = start(false).await;
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap();
        drop(closed);

        // ICMP port-unreachable surfaces as ECONNREFUSED on the pending recv.
        h.socket.connect(closed_addr).await.unwrap();
        h.socket.send(b"x").await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), &mut h.handle)
            .await
            .expect("listener should stop after a receive error")
            .unwrap();
        assert_eq!(*h.state.borrow(), ListenerState::Stopped);
        assert_eq!(h.slot.peek(), None);
    }
}
