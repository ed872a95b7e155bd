/*!
 * Runtime Configuration
 *
 * Deadlines, delays and capacities handed to the timer-based wrappers.
 * Durations serialize as whole milliseconds.
 */

use crate::core::errors::{OpError, OpResult};
use crate::core::limits::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration shared by transactions, writers and races
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Time a transaction waits for its reply (default: 1s)
    #[serde(with = "duration_ms")]
    pub reply_timeout: Duration,

    /// Time allowed for writing one frame (default: 5s)
    #[serde(with = "duration_ms")]
    pub write_timeout: Duration,

    /// Time allowed for establishing a transport (default: 10s)
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Pause after reconfiguring a peer before talking to it (default: 50ms)
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,

    /// Resends after a reply timeout
    pub retries: u32,

    /// Live transaction limit per multiplexer
    pub max_pending: usize,

    /// Signal numbers that interrupt signal-bounded operations
    pub signals: Vec<i32>,
}

impl RuntimeConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            reply_timeout: STANDARD_REPLY_TIMEOUT,
            write_timeout: STANDARD_WRITE_TIMEOUT,
            connect_timeout: STANDARD_CONNECT_TIMEOUT,
            settle_delay: STANDARD_SETTLE_DELAY,
            retries: DEFAULT_RETRIES,
            max_pending: DEFAULT_MAX_PENDING,
            signals: default_signals(),
        }
    }

    /// Create aggressive configuration for development against local peers
    pub fn aggressive() -> Self {
        Self {
            reply_timeout: RESTRICTED_REPLY_TIMEOUT,
            write_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(2),
            retries: 1,
            ..Self::new()
        }
    }

    /// Create relaxed configuration for slow links
    pub fn relaxed() -> Self {
        Self {
            reply_timeout: RELAXED_REPLY_TIMEOUT,
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(250),
            retries: 5,
            ..Self::new()
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_max_pending(mut self, limit: usize) -> Self {
        self.max_pending = limit;
        self
    }

    pub fn with_signals(mut self, signals: Vec<i32>) -> Self {
        self.signals = signals;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> OpResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OpError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `OPFLOW_*` environment variables
    pub fn from_env() -> OpResult<Self> {
        Self::new().apply_env()
    }

    /// Apply `OPFLOW_*` environment overrides on top of `self`
    pub fn apply_env(mut self) -> OpResult<Self> {
        if let Some(ms) = env_parse::<u64>("OPFLOW_REPLY_TIMEOUT_MS")? {
            self.reply_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("OPFLOW_WRITE_TIMEOUT_MS")? {
            self.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("OPFLOW_CONNECT_TIMEOUT_MS")? {
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("OPFLOW_SETTLE_DELAY_MS")? {
            self.settle_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = env_parse::<u32>("OPFLOW_RETRIES")? {
            self.retries = retries;
        }
        if let Some(limit) = env_parse::<usize>("OPFLOW_MAX_PENDING")? {
            self.max_pending = limit;
        }
        if let Ok(raw) = std::env::var("OPFLOW_SIGNALS") {
            self.signals = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i32>().map_err(|_| {
                        OpError::InvalidConfig(format!("OPFLOW_SIGNALS: bad signal number {:?}", s))
                    })
                })
                .collect::<OpResult<_>>()?;
        }

        self.validate()?;
        debug!(config = ?self, "runtime config loaded");
        Ok(self)
    }

    /// Reject zero deadlines and zero capacity
    pub fn validate(&self) -> OpResult<()> {
        let deadlines = [
            ("reply_timeout", self.reply_timeout),
            ("write_timeout", self.write_timeout),
            ("connect_timeout", self.connect_timeout),
        ];
        for (name, value) in deadlines {
            if value.is_zero() {
                return Err(OpError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }
        if self.max_pending == 0 {
            return Err(OpError::InvalidConfig("max_pending must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> OpResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OpError::InvalidConfig(format!("{}: cannot parse {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
