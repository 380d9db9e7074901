//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::{DEFAULT_COPIES, DEFAULT_POLL_TIMEOUT, MAX_COPIES, MAX_NODES, MAX_RETRY_COUNT};

/// Configuration for the [`Gateway`](super::Gateway).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bounded readiness wait per drain iteration
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_timeout: Duration,

    /// Per-attempt timeout for sends and response reads
    #[serde(deserialize_with = "deserialize_duration")]
    pub io_timeout: Duration,

    /// Retries allowed after a timeout while the epoch is unchanged
    pub max_retry_count: u32,

    /// Copy count when neither request nor VDI names one
    pub default_copies: u8,

    /// Upper bound on copies per object
    pub max_copies: usize,

    /// Upper bound on outstanding forwards per request
    pub max_nodes: usize,

    /// Keep issuing forwards to later copies after one fails to send
    pub continue_on_send_failure: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            io_timeout: DEFAULT_POLL_TIMEOUT,
            max_retry_count: MAX_RETRY_COUNT,
            default_copies: DEFAULT_COPIES,
            max_copies: MAX_COPIES,
            max_nodes: MAX_NODES,
            continue_on_send_failure: false,
        }
    }
}

impl GatewayConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout.is_zero() {
            return Err(Error::Config("poll_timeout must be > 0".into()));
        }
        if self.io_timeout.is_zero() {
            return Err(Error::Config("io_timeout must be > 0".into()));
        }
        if self.max_copies == 0 || self.max_copies > MAX_COPIES {
            return Err(Error::Config(format!(
                "max_copies must be in 1..={}",
                MAX_COPIES
            )));
        }
        if self.default_copies == 0 || self.default_copies as usize > self.max_copies {
            return Err(Error::Config(format!(
                "default_copies must be in 1..={}",
                self.max_copies
            )));
        }
        if self.max_nodes == 0 || self.max_nodes > MAX_NODES {
            return Err(Error::Config(format!(
                "max_nodes must be in 1..={}",
                MAX_NODES
            )));
        }
        Ok(())
    }

    /// Parse from YAML and validate.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Parse a duration string like "5s", "250ms", "1m30s".
///
/// A trailing bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            num_buf.push(c);
            continue;
        }

        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        num_buf.clear();

        let multiplier = match c {
            'm' | 'M' if matches!(chars.peek(), Some('s') | Some('S')) => {
                chars.next();
                1
            }
            'h' | 'H' => 3_600_000,
            'm' | 'M' => 60_000,
            's' | 'S' => 1_000,
            'd' | 'D' => 86_400_000,
            _ => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit: {}",
                    c
                )))
            }
        };

        total_ms += num * multiplier;
    }

    if !num_buf.is_empty() {
        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        total_ms += num * 1_000;
    }

    Ok(Duration::from_millis(total_ms))
}
