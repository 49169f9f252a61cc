//! # Configuration
//!
//! Session and endpoint tuning, loaded once at startup from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [session]
//! mode = "event"
//! initial_count = 30
//! min_rto_secs = 0.03
//!
//! [endpoint]
//! name = "client"
//! rtt_smoothing_factor = 0.0025
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_MAGAZINE, MAX_CORRECTIVE_RESENDS, MAX_PACKET_SIZE, MIN_PACKET_SIZE, MIN_RTO_SECS,
    STORE_CAPACITY,
};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which wire shape carries the synchronized counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// 8-byte counter-only packets.
    Bare,
    /// 34-byte input event packets with the counter appended.
    #[default]
    Event,
}

/// Per-session reliability and sync settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Slots in the outstanding-packet ring buffer.
    pub store_capacity: usize,
    /// Lower bound on the retransmission timeout, in seconds.
    pub min_rto_secs: f64,
    /// Double the timeout per retransmission of the same entry.
    pub rto_backoff: bool,
    /// Cap on the backoff doubling.
    pub max_backoff_exponent: u32,
    /// Consecutive corrective resends before suppression. 0 = unbounded.
    pub max_corrective_resends: u32,
    /// Starting magazine count on both peers.
    pub initial_count: i32,
    /// Wire shape.
    pub mode: SyncMode,
    /// Name written into outgoing event packets (truncated to 16 bytes).
    pub event_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_capacity: STORE_CAPACITY,
            min_rto_secs: MIN_RTO_SECS,
            rto_backoff: false,
            max_backoff_exponent: 5,
            max_corrective_resends: MAX_CORRECTIVE_RESENDS,
            initial_count: DEFAULT_MAGAZINE,
            mode: SyncMode::Event,
            event_name: "weapon_type".to_string(),
        }
    }
}

impl SessionConfig {
    /// Corrective resend cap, `None` when unbounded.
    #[must_use]
    pub const fn corrective_resend_limit(&self) -> Option<u32> {
        if self.max_corrective_resends == 0 {
            None
        } else {
            Some(self.max_corrective_resends)
        }
    }

    /// Checks ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store_capacity == 0 {
            return Err(ConfigError::Invalid("session.store_capacity must be > 0".into()));
        }
        if !self.min_rto_secs.is_finite() || self.min_rto_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "session.min_rto_secs must be a non-negative number, got {}",
                self.min_rto_secs
            )));
        }
        if self.max_backoff_exponent > 16 {
            return Err(ConfigError::Invalid(
                "session.max_backoff_exponent must be <= 16".into(),
            ));
        }
        if self.initial_count < 0 {
            return Err(ConfigError::Invalid(format!(
                "session.initial_count must be >= 0, got {}",
                self.initial_count
            )));
        }
        Ok(())
    }
}

/// Transport endpoint settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Name used in log lines.
    pub name: String,
    /// Largest datagram the endpoint will emit, header included.
    pub max_packet_size: usize,
    /// Sent-packet history used for ack matching and loss estimation.
    pub sent_packets_buffer_size: usize,
    /// Received-packet history used to build ack bitfields.
    pub received_packets_buffer_size: usize,
    /// Weight of each new RTT sample.
    pub rtt_smoothing_factor: f32,
    /// Weight of each new packet loss sample.
    pub packet_loss_smoothing_factor: f32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: "endpoint".to_string(),
            max_packet_size: MAX_PACKET_SIZE,
            sent_packets_buffer_size: 256,
            received_packets_buffer_size: 256,
            rtt_smoothing_factor: 0.0025,
            packet_loss_smoothing_factor: 0.1,
        }
    }
}

impl EndpointConfig {
    /// Default configuration with a log name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Checks ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sent_packets_buffer_size < 2 || self.received_packets_buffer_size < 2 {
            return Err(ConfigError::Invalid(
                "endpoint packet buffers need at least 2 slots".into(),
            ));
        }
        if self.sent_packets_buffer_size > 32_768 || self.received_packets_buffer_size > 32_768 {
            return Err(ConfigError::Invalid(
                "endpoint packet buffers must cover at most half the sequence space".into(),
            ));
        }
        for (field, value) in [
            ("rtt_smoothing_factor", self.rtt_smoothing_factor),
            ("packet_loss_smoothing_factor", self.packet_loss_smoothing_factor),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint.{field} must be in (0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagsyncConfig {
    /// Reliability and sync settings.
    pub session: SessionConfig,
    /// Transport endpoint settings.
    pub endpoint: EndpointConfig,
}

impl MagsyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`MagsyncConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Validates both sections.
    ///
    /// The endpoint on its own accepts any payload room; here every
    /// application packet must also fit.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.session.validate()?;
        self.endpoint.validate()?;
        let size = self.endpoint.max_packet_size;
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(ConfigError::Invalid(format!(
                "endpoint.max_packet_size must be in {MIN_PACKET_SIZE}..={MAX_PACKET_SIZE}, got {size}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = MagsyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, MagsyncConfig::default());
        assert_eq!(config.session.store_capacity, STORE_CAPACITY);
        assert_eq!(config.session.mode, SyncMode::Event);
    }

    #[test]
    fn test_partial_override() {
        let config = MagsyncConfig::from_toml_str(
            r#"
            [session]
            mode = "bare"
            initial_count = 12
            max_corrective_resends = 0

            [endpoint]
            name = "server"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.mode, SyncMode::Bare);
        assert_eq!(config.session.initial_count, 12);
        assert_eq!(config.session.corrective_resend_limit(), None);
        assert_eq!(config.session.min_rto_secs, MIN_RTO_SECS);
        assert_eq!(config.endpoint.name, "server");
        assert_eq!(config.endpoint.sent_packets_buffer_size, 256);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = MagsyncConfig::from_toml_str("[session]\nstore_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_smoothing() {
        let err = MagsyncConfig::from_toml_str("[endpoint]\nrtt_smoothing_factor = 0.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("rtt_smoothing_factor"));
    }

    #[test]
    fn test_rejects_packet_size_without_room_for_events() {
        let err = MagsyncConfig::from_toml_str("[endpoint]\nmax_packet_size = 42\n").unwrap_err();
        assert!(err.to_string().contains("max_packet_size"));

        let config = MagsyncConfig::from_toml_str("[endpoint]\nmax_packet_size = 43\n").unwrap();
        assert_eq!(config.endpoint.max_packet_size, MIN_PACKET_SIZE);

        let err = MagsyncConfig::from_toml_str("[endpoint]\nmax_packet_size = 4096\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let err = MagsyncConfig::from_toml_str("[session]\nmode = \"fancy\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = MagsyncConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
