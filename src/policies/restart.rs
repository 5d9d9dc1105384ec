//! # Restart policy for worker units.
//!
//! [`RestartPolicy`] tells the host what to do after a worker unit exits.
//! Workers always exit with a non-zero status, so the host never inspects the
//! exit code: every exit is treated the same way and the policy alone decides.
//!
//! - [`RestartPolicy::Never`] the unit is not respawned; its slot is released.
//! - [`RestartPolicy::After`] the unit is respawned after the given delay.
//!
//! ## Settings mapping
//! ```text
//! restart_time = -1   → RestartPolicy::Never
//! restart_time = 0    → RestartPolicy::After(0s)   (respawn immediately)
//! restart_time = N    → RestartPolicy::After(N s)
//! restart_time < -1   → rejected (ConfigError::InvalidRestartTime)
//! ```

use std::time::Duration;

use crate::error::ConfigError;

/// Settings value that disables automatic restart.
pub const RESTART_DISABLED: i64 = -1;

/// Policy controlling whether a worker unit is respawned after it exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never respawn.
    Never,
    /// Respawn after the given delay.
    After(Duration),
}

impl RestartPolicy {
    /// Builds a policy from a `restart_time` setting (seconds or [`RESTART_DISABLED`]).
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use tickvisor::RestartPolicy;
    ///
    /// assert_eq!(RestartPolicy::from_secs(-1).unwrap(), RestartPolicy::Never);
    /// assert_eq!(
    ///     RestartPolicy::from_secs(10).unwrap(),
    ///     RestartPolicy::After(Duration::from_secs(10))
    /// );
    /// assert!(RestartPolicy::from_secs(-5).is_err());
    /// ```
    pub fn from_secs(secs: i64) -> Result<Self, ConfigError> {
        match secs {
            RESTART_DISABLED => Ok(RestartPolicy::Never),
            s if s >= 0 => Ok(RestartPolicy::After(Duration::from_secs(s as u64))),
            s => Err(ConfigError::InvalidRestartTime(s)),
        }
    }

    /// Returns the respawn delay, or `None` when restart is disabled.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RestartPolicy::Never => None,
            RestartPolicy::After(d) => Some(*d),
        }
    }
}

impl Default for RestartPolicy {
    /// Returns `RestartPolicy::After(10s)`.
    fn default() -> Self {
        RestartPolicy::After(Duration::from_secs(10))
    }
}
