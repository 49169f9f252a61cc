//! Command-line plumbing shared by the `magsync_*` and `bullet_sync`
//! binaries: log setup, config loading, flag overrides and Ctrl+C.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use magsync_shared::{ConfigResult, MagsyncConfig, SyncMode};
use tracing_subscriber::EnvFilter;

/// `--mode` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// 8-byte counter packets.
    Bare,
    /// 34-byte event packets.
    Event,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Bare => Self::Bare,
            ModeArg::Event => Self::Event,
        }
    }
}

/// Flags every binary accepts.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Sync mode, overrides the config file
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Starting magazine count, overrides the config file
    #[arg(long)]
    pub initial_count: Option<i32>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CommonArgs {
    /// Loads the config file (or defaults), applies flag overrides, validates.
    ///
    /// # Errors
    ///
    /// Returns the [`magsync_shared::ConfigError`] from loading or validation.
    pub fn resolve_config(&self) -> ConfigResult<MagsyncConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(mode) = self.mode {
            config.session.mode = mode.into();
        }
        if let Some(initial) = self.initial_count {
            config.session.initial_count = initial;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Reads `path`, or returns the defaults when no file is given.
///
/// # Errors
///
/// Returns the [`magsync_shared::ConfigError`] from [`MagsyncConfig::load`].
pub fn load_config(path: Option<&Path>) -> ConfigResult<MagsyncConfig> {
    match path {
        Some(path) => MagsyncConfig::load(path),
        None => Ok(MagsyncConfig::default()),
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

/// Outer run flag, checked once per tick by the binaries' loops.
#[derive(Clone, Debug)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    /// A flag that starts out running.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Returns false once a stop was requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Requests the loop to stop after the current tick.
    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Creates a flag cleared by Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns the [`ctrlc::Error`] if a handler is already installed.
    pub fn on_ctrlc() -> Result<Self, ctrlc::Error> {
        let flag = Self::new();
        let handle = flag.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Received Ctrl+C, shutting down...");
            handle.stop();
        })?;
        Ok(flag)
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common(mode: Option<ModeArg>, initial_count: Option<i32>) -> CommonArgs {
        CommonArgs {
            config: None,
            mode,
            initial_count,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_defaults_without_file() {
        let config = common(None, None).resolve_config().unwrap();
        assert_eq!(config, MagsyncConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let config = common(Some(ModeArg::Bare), Some(5)).resolve_config().unwrap();
        assert_eq!(config.session.mode, SyncMode::Bare);
        assert_eq!(config.session.initial_count, 5);
    }

    #[test]
    fn test_run_flag_stop_is_shared() {
        let flag = RunFlag::new();
        let handle = flag.clone();
        assert!(flag.is_running());
        handle.stop();
        assert!(!flag.is_running());
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(common(None, Some(-3)).resolve_config().is_err());
    }
}
