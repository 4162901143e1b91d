/// Session configuration
///
/// Every field has a default, so a YAML file only needs to name what it
/// changes:
///
/// ```yaml
/// remote: "127.0.0.1:9000"
/// wait:
///   max_attempts: 10
/// ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contracts::{Command, Endpoint};
use crate::errors::{LinkError, Result};

/// Largest datagram a UDP socket can deliver
const MAX_UDP_DATAGRAM: usize = 65_535;

/// How long `send_and_wait` waits for a reply
///
/// The deadline is `poll_interval * max_attempts`. Intervals are kept in
/// whole milliseconds; `new` truncates anything finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitPolicy {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval_ms: poll_interval.as_millis() as u64,
            max_attempts,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        self.poll_interval().saturating_mul(self.max_attempts)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: crate::DEFAULT_POLL_INTERVAL_MS,
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Grace period granted to the listener on close
///
/// Millisecond granularity, like `WaitPolicy`. A zero grace aborts the
/// listener immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownPolicy {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl ShutdownPolicy {
    pub fn new(poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            poll_interval_ms: poll_interval.as_millis() as u64,
            max_polls,
        }
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).saturating_mul(self.max_polls)
    }
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: crate::DEFAULT_POLL_INTERVAL_MS,
            max_polls: crate::DEFAULT_SHUTDOWN_POLLS,
        }
    }
}

/// Full configuration of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub local: Endpoint,
    pub remote: Endpoint,
    pub wait: WaitPolicy,
    pub shutdown: ShutdownPolicy,
    /// Sent in order right after the listener starts
    pub init_commands: Vec<String>,
    pub max_datagram_size: usize,
    /// Keep datagrams whose source is not the remote endpoint
    pub accept_any_source: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            local: Endpoint::default_local(),
            remote: Endpoint::default_remote(),
            wait: WaitPolicy::default(),
            shutdown: ShutdownPolicy::default(),
            init_commands: vec![
                Command::enter_command_mode().to_string(),
                Command::stream_on().to_string(),
            ],
            max_datagram_size: crate::DEFAULT_RECV_BUFFER_SIZE,
            accept_any_source: false,
        }
    }
}

impl LinkConfig {
    /// Default config between two explicit endpoints
    pub fn new(local: Endpoint, remote: Endpoint) -> Self {
        Self {
            local,
            remote,
            ..Self::default()
        }
    }

    /// Load and validate a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LinkError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML config text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| LinkError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.wait.poll_interval_ms == 0 {
            return Err(LinkError::Config(
                "wait.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.wait.max_attempts == 0 {
            return Err(LinkError::Config(
                "wait.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_datagram_size == 0 || self.max_datagram_size > MAX_UDP_DATAGRAM {
            return Err(LinkError::Config(format!(
                "max_datagram_size must be within 1..={}, got {}",
                MAX_UDP_DATAGRAM, self.max_datagram_size
            )));
        }
        Ok(())
    }

    pub fn with_local(mut self, local: Endpoint) -> Self {
        self.local = local;
        self
    }

    pub fn with_remote(mut self, remote: Endpoint) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_init_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.init_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_accept_any_source(mut self, accept: bool) -> Self {
        self.accept_any_source = accept;
        self
    }

    pub(crate) fn init_sequence(&self) -> impl Iterator<Item = Command> + '_ {
        self.init_commands.iter().map(|c| Command::new(c.as_str()))
    }
}
