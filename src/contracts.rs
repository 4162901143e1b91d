/// Core data structures for the command link
///
/// Payloads are opaque: commands go out as their raw UTF-8 bytes and replies
/// are kept byte-for-byte as received. No framing is added on either side.
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};

/// Endpoint - address/port pair of the local socket or the remote device
///
/// Serialized as an `"ip:port"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub const fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    /// Controller-side default (`192.168.10.3:8889`)
    pub const fn default_local() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::new(192, 168, 10, 3)), crate::DEFAULT_PORT)
    }

    /// Device-side default (`192.168.10.1:8889`)
    pub const fn default_remote() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1)), crate::DEFAULT_PORT)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.socket_addr()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl FromStr for Endpoint {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<SocketAddr>()
            .map(Self::from)
            .map_err(|_| LinkError::InvalidEndpoint(s.to_string()))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = LinkError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Command - opaque text token sent verbatim as one datagram
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Puts the device into command mode
    pub fn enter_command_mode() -> Self {
        Self::new("command")
    }

    /// Starts the device's telemetry/video stream
    pub fn stream_on() -> Self {
        Self::new("streamon")
    }

    pub fn takeoff() -> Self {
        Self::new("takeoff")
    }

    pub fn land() -> Self {
        Self::new("land")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire form of the command
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Reply - raw payload received from the remote endpoint
///
/// A zero-length reply is still a reply. The absence of a reply is
/// represented by `Option::None` at the call site, never by an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    payload: Vec<u8>,
}

impl Reply {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Strict UTF-8 view of the payload
    ///
    /// # Errors
    /// Returns `LinkError::InvalidUtf8` if the device sent non-text bytes
    pub fn as_text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).map_err(|_| LinkError::InvalidUtf8)
    }

    /// Lossy text rendering, used for logging
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

impl From<&[u8]> for Reply {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// Listener loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Draining the socket into the response slot
    Running,
    /// Stop signal observed, loop is exiting
    Stopping,
    /// Loop has exited, either cleanly or after a receive error
    Stopped,
}

impl ListenerState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse_and_display() {
        let endpoint: Endpoint = "192.168.10.1:8889".parse().unwrap();
        assert_eq!(endpoint, Endpoint::default_remote());
        assert_eq!(endpoint.to_string(), "192.168.10.1:8889");

        let endpoint: Endpoint = " [::1]:9000 ".parse().unwrap();
        assert_eq!(endpoint.port, 9000);
        assert!(endpoint.address.is_ipv6());

        assert!(matches!(
            "192.168.10.1".parse::<Endpoint>(),
            Err(LinkError::InvalidEndpoint(_))
        ));
        assert!("not-an-address:80".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_endpoint_socket_addr_conversion() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let endpoint = Endpoint::from(addr);
        assert_eq!(SocketAddr::from(endpoint), addr);
    }

    #[test]
    fn test_command_is_sent_verbatim() {
        assert_eq!(Command::takeoff().as_bytes(), b"takeoff");
        assert_eq!(Command::land().as_str(), "land");
        assert_eq!(Command::enter_command_mode().as_str(), "command");
        assert_eq!(Command::stream_on().as_str(), "streamon");
        assert_eq!(Command::from(" speed 10 ").as_bytes(), b" speed 10 ");
    }

    #[test]
    fn test_empty_reply_is_a_reply() {
        let reply = Reply::new(Vec::new());
        assert!(reply.is_empty());
        assert_eq!(reply.as_text().unwrap(), "");
        assert_ne!(Some(reply), None);
    }

    #[test]
    fn test_listener_state_names() {
        assert_eq!(ListenerState::Running.to_string(), "running");
        assert_eq!(ListenerState::Stopping.to_string(), "stopping");
        assert_eq!(ListenerState::Stopped.to_string(), "stopped");
        assert!(ListenerState::Running.is_running());
        assert!(!ListenerState::Stopping.is_running());
    }

    #[test]
    fn test_reply_text_views() {
        let reply = Reply::from(&b"ok"[..]);
        assert_eq!(reply.as_text().unwrap(), "ok");
        assert_eq!(reply.len(), 2);

        let binary = Reply::new(vec![0xff, 0xfe, b'o']);
        assert!(matches!(binary.as_text(), Err(LinkError::InvalidUtf8)));
        assert_eq!(binary.to_text_lossy(), "\u{fffd}\u{fffd}o");
        assert_eq!(binary.into_bytes(), vec![0xff, 0xfe, b'o']);
    }
}
