/// Transmitter module - outbound side of the datagram transport
///
/// Binds the session socket and sends commands as raw datagrams. The socket
/// is shared with the listener task; tokio's `UdpSocket` supports concurrent
/// send and receive through `&self`.

use tokio::net::UdpSocket;

use crate::contracts::{Command, Endpoint};
use crate::errors::{LinkError, Result};

/// Bind a UDP socket to `endpoint`
///
/// # Errors
/// Returns `LinkError::Bind` if the address is unavailable or in use
pub async fn bind(endpoint: Endpoint) -> Result<UdpSocket> {
    UdpSocket::bind(endpoint.socket_addr())
        .await
        .map_err(|source| LinkError::Bind { endpoint, source })
}

/// Transmitter - stateless send path for commands
pub struct Transmitter;

impl Transmitter {
    /// Wire bytes of a command, checked against the datagram limit
    ///
    /// # Errors
    /// Returns `LinkError::PayloadTooLarge` if the command exceeds
    /// `MAX_PAYLOAD_SIZE`
    pub fn encode(command: &Command) -> Result<&[u8]> {
        Self::check_size(command.as_bytes())
    }

    fn check_size(bytes: &[u8]) -> Result<&[u8]> {
        if bytes.len() > crate::MAX_PAYLOAD_SIZE {
            return Err(LinkError::PayloadTooLarge {
                size: bytes.len(),
                max: crate::MAX_PAYLOAD_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Send a command to `destination`
    ///
    /// Not retried: a failed send is returned to the caller as
    /// `LinkError::Transport`.
    pub async fn send(
        socket: &UdpSocket,
        command: &Command,
        destination: Endpoint,
    ) -> Result<usize> {
        let bytes = Self::encode(command)?;
        Self::send_raw(socket, bytes, destination).await
    }

    /// Send pre-encoded bytes
    pub async fn send_raw(socket: &UdpSocket, bytes: &[u8], destination: Endpoint) -> Result<usize> {
        let bytes = Self::check_size(bytes)?;
        let sent = socket.send_to(bytes, destination.socket_addr()).await?;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> Endpoint {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_encode_rejects_oversized_command() {
        let command = Command::new("x".repeat(crate::MAX_PAYLOAD_SIZE + 1));
        let err = Transmitter::encode(&command).unwrap_err();
        assert!(matches!(
            err,
            LinkError::PayloadTooLarge { size, max } if size == max + 1
        ));

        let command = Command::new("x".repeat(crate::MAX_PAYLOAD_SIZE));
        assert_eq!(Transmitter::encode(&command).unwrap().len(), crate::MAX_PAYLOAD_SIZE);
    }

    #[tokio::test]
    async fn test_send_delivers_raw_bytes() {
        let sender = bind(loopback()).await.unwrap();
        let device = bind(loopback()).await.unwrap();
        let device_endpoint = Endpoint::from(device.local_addr().unwrap());

        let sent = Transmitter::send(&sender, &Command::takeoff(), device_endpoint)
            .await
            .unwrap();
        assert_eq!(sent, 7);

        let mut buf = [0u8; 64];
        let (n, from) = device.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"takeoff");
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = bind(loopback()).await.unwrap();
        let taken = Endpoint::from(first.local_addr().unwrap());

        let err = bind(taken).await.unwrap_err();
        assert!(matches!(err, LinkError::Bind { endpoint, .. } if endpoint == taken));
    }
}
