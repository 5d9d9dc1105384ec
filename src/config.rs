//! # Ticker configuration store.
//!
//! [`TickerConfig`] is the validated, in-memory view of the ticker settings.
//! [`ConfigStore`] owns one and replaces it atomically on [`ConfigStore::reload`].
//!
//! ## Sources
//! Settings come from a [`SettingsSource`]:
//! - [`FileSettings`] TOML file (`[ticker]` table) overlaid by `TICKVISOR_*` env vars;
//! - [`MemorySettings`] mutable in-memory settings (embedding, tests).
//!
//! ```toml
//! [ticker]
//! naptime = 10            # seconds between ticks, >= 1
//! database = "app"        # unset → no static workers
//! restart_time = 10       # seconds, or -1 to disable restart
//! total_workers = 1       # static workers registered at startup
//! statement = "SELECT tickvisor.tick()"
//! ```
//!
//! ## Reload rules
//! - A reload re-reads the **same** source the store was loaded from.
//! - Invalid settings are rejected: the previous config stays in effect and
//!   the error is logged.
//! - Readers take an `Arc` snapshot; a reload never mutates a snapshot in use.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use figment::{
    providers::{Env, Format as _, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ConfigError;
use crate::policies::RestartPolicy;

/// Statement executed by every tick unless configured otherwise.
pub const DEFAULT_STATEMENT: &str = "SELECT tickvisor.tick()";

/// Settings table name inside the TOML file.
const SETTINGS_KEY: &str = "ticker";

/// Prefix for environment overrides (`TICKVISOR_NAPTIME=5`).
const ENV_PREFIX: &str = "TICKVISOR_";

/// Raw, unvalidated settings as read from a source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerSettings {
    /// Seconds between ticks.
    pub naptime: i64,
    /// Database the static workers connect to.
    pub database: Option<String>,
    /// Seconds before a dead worker is respawned; `-1` disables restart.
    pub restart_time: i64,
    /// Number of static workers registered at startup.
    pub total_workers: i64,
    /// Statement executed once per tick.
    pub statement: String,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            naptime: 10,
            database: None,
            restart_time: 10,
            total_workers: 1,
            statement: DEFAULT_STATEMENT.to_string(),
        }
    }
}

/// Validated ticker configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickerConfig {
    /// Time between ticks (>= 1s).
    pub naptime: Duration,
    /// Target database name; `None` disables static registration.
    pub database: Option<String>,
    /// Restart policy applied to every worker descriptor.
    pub restart: RestartPolicy,
    /// Number of static workers (>= 1).
    pub total_workers: u32,
    /// Statement executed once per tick.
    pub statement: String,
}

impl TryFrom<TickerSettings> for TickerConfig {
    type Error = ConfigError;

    fn try_from(s: TickerSettings) -> Result<Self, Self::Error> {
        if s.naptime < 1 {
            return Err(ConfigError::InvalidNaptime(s.naptime));
        }
        let restart = RestartPolicy::from_secs(s.restart_time)?;
        let total_workers = u32::try_from(s.total_workers)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(ConfigError::InvalidWorkerCount(s.total_workers))?;
        if s.statement.trim().is_empty() {
            return Err(ConfigError::EmptyStatement);
        }

        Ok(Self {
            naptime: Duration::from_secs(s.naptime as u64),
            database: s.database.filter(|d| !d.is_empty()),
            restart,
            total_workers,
            statement: s.statement,
        })
    }
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            naptime: Duration::from_secs(10),
            database: None,
            restart: RestartPolicy::default(),
            total_workers: 1,
            statement: DEFAULT_STATEMENT.to_string(),
        }
    }
}

/// Where ticker settings are read from.
pub trait SettingsSource: Send + Sync + 'static {
    /// Reads the current raw settings.
    fn read(&self) -> Result<TickerSettings, ConfigError>;

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

/// TOML file source with `TICKVISOR_*` environment overrides.
#[derive(Clone, Debug)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Creates a source for the given TOML file. A missing file yields defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn figment(&self) -> Figment {
        Figment::new()
            .merge(Serialized::default(SETTINGS_KEY, TickerSettings::default()))
            .merge(Toml::file(&self.path))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| format!("{SETTINGS_KEY}.{}", key.as_str()).into()),
            )
    }
}

impl SettingsSource for FileSettings {
    fn read(&self) -> Result<TickerSettings, ConfigError> {
        Ok(self.figment().extract_inner(SETTINGS_KEY)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// In-memory settings that can be changed at runtime (followed by a reload).
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: RwLock<TickerSettings>,
}

impl MemorySettings {
    /// Creates a source holding `settings`.
    pub fn new(settings: TickerSettings) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(settings),
        })
    }

    /// Applies `f` to the stored settings. Takes effect on the next reload.
    pub fn update(&self, f: impl FnOnce(&mut TickerSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl SettingsSource for MemorySettings {
    fn read(&self) -> Result<TickerSettings, ConfigError> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Holds the current [`TickerConfig`] and swaps it on reload.
///
/// Each worker owns its own store (see [`ConfigStore::fork`]) so that a reload
/// in one worker never changes the config another worker is using mid-tick.
pub struct ConfigStore {
    source: Arc<dyn SettingsSource>,
    current: watch::Sender<Arc<TickerConfig>>,
}

impl ConfigStore {
    /// Reads and validates `source` once.
    pub fn load(source: Arc<dyn SettingsSource>) -> Result<Self, ConfigError> {
        let cfg = TickerConfig::try_from(source.read()?)?;
        tracing::debug!(source = %source.describe(), ?cfg, "ticker config loaded");
        let (current, _) = watch::channel(Arc::new(cfg));
        Ok(Self { source, current })
    }

    /// Returns a snapshot of the config in effect.
    pub fn current(&self) -> Arc<TickerConfig> {
        self.current.borrow().clone()
    }

    /// Re-reads the source and replaces the config if it is valid.
    ///
    /// On error the previous config is kept and the error is returned
    /// (and logged at `warn`).
    pub fn reload(&self) -> Result<Arc<TickerConfig>, ConfigError> {
        let next = self
            .source
            .read()
            .and_then(TickerConfig::try_from)
            .map(Arc::new);

        match next {
            Ok(cfg) => {
                self.current.send_replace(Arc::clone(&cfg));
                tracing::info!(source = %self.source.describe(), ?cfg, "ticker config reloaded");
                Ok(cfg)
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    error = %e,
                    label = e.as_label(),
                    "ticker config reload rejected; keeping previous settings"
                );
                Err(e)
            }
        }
    }

    /// Creates an independent store with the same source and current config.
    pub fn fork(&self) -> Self {
        let (current, _) = watch::channel(self.current());
        Self {
            source: Arc::clone(&self.source),
            current,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = TickerConfig::try_from(TickerSettings::default()).unwrap();
        assert_eq!(cfg, TickerConfig::default());
        assert!(cfg.database.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = |f: fn(&mut TickerSettings)| {
            let mut s = TickerSettings::default();
            f(&mut s);
            TickerConfig::try_from(s).unwrap_err()
        };
        assert!(matches!(bad(|s| s.naptime = 0), ConfigError::InvalidNaptime(0)));
        assert!(matches!(
            bad(|s| s.restart_time = -3),
            ConfigError::InvalidRestartTime(-3)
        ));
        assert!(matches!(
            bad(|s| s.total_workers = 0),
            ConfigError::InvalidWorkerCount(0)
        ));
        assert!(matches!(
            bad(|s| s.statement = "  ".into()),
            ConfigError::EmptyStatement
        ));
    }

    #[test]
    fn test_empty_database_means_unset() {
        let s = TickerSettings {
            database: Some(String::new()),
            ..TickerSettings::default()
        };
        assert!(TickerConfig::try_from(s).unwrap().database.is_none());
    }

    #[test]
    fn test_reload_keeps_previous_on_error() {
        let settings = MemorySettings::new(TickerSettings::default());
        let store = ConfigStore::load(settings.clone()).unwrap();

        settings.update(|s| s.naptime = 3);
        assert_eq!(store.reload().unwrap().naptime, Duration::from_secs(3));

        settings.update(|s| s.naptime = -1);
        assert!(store.reload().is_err());
        assert_eq!(store.current().naptime, Duration::from_secs(3));
    }

    #[test]
    fn test_fork_reloads_independently() {
        let settings = MemorySettings::new(TickerSettings::default());
        let host = ConfigStore::load(settings.clone()).unwrap();
        let worker = host.fork();

        settings.update(|s| s.naptime = 1);
        worker.reload().unwrap();

        assert_eq!(worker.current().naptime, Duration::from_secs(1));
        assert_eq!(host.current().naptime, Duration::from_secs(10));
    }

    #[test]
    fn test_file_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[ticker]\nnaptime = 5\ndatabase = \"app\"\nrestart_time = -1\ntotal_workers = 2"
        )
        .unwrap();

        let cfg = ConfigStore::load(Arc::new(FileSettings::new(file.path())))
            .unwrap()
            .current();
        assert_eq!(cfg.naptime, Duration::from_secs(5));
        assert_eq!(cfg.database.as_deref(), Some("app"));
        assert_eq!(cfg.restart, RestartPolicy::Never);
        assert_eq!(cfg.total_workers, 2);
        assert_eq!(cfg.statement, DEFAULT_STATEMENT);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSettings::new(dir.path().join("absent.toml"));
        assert_eq!(
            TickerConfig::try_from(source.read().unwrap()).unwrap().naptime,
            Duration::from_secs(10)
        );
    }
}
