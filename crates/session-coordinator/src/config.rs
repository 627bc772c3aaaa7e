//! Coordinator configuration.
//!
//! Configuration covers the ambient knobs of the coordinator (token renewal
//! scheduling, channel capacities). Provider selection and credentials are
//! not configuration; they arrive through the explicit `configure`
//! operation so a coordinator instance can be constructed, injected, and
//! torn down without process-wide state.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default lead time before token expiry at which renewal is attempted.
pub const DEFAULT_RENEWAL_LEAD: Duration = Duration::from_secs(30);

/// Initial backoff delay between failed renewal attempts.
pub const DEFAULT_RENEWAL_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Maximum backoff delay between failed renewal attempts.
pub const DEFAULT_RENEWAL_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Renewal attempts before giving up and emitting a terminal failure event.
pub const DEFAULT_RENEWAL_MAX_ATTEMPTS: u32 = 5;

/// Default capacity of the provider event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default capacity of the coordinator command mailbox.
pub const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Default capacity of the broadcast channel for coordinator events.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 128;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable holds an unparsable or out-of-range value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Coordinator configuration, loaded from environment variables or built
/// programmatically.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Renewal is attempted this long before the reported token expiry.
    pub renewal_lead: Duration,
    /// Initial backoff delay for failed renewal attempts.
    pub renewal_backoff_base: Duration,
    /// Backoff cap for failed renewal attempts.
    pub renewal_backoff_cap: Duration,
    /// Renewal attempts before the terminal failure event.
    pub renewal_max_attempts: u32,
    /// Capacity of the provider event channel.
    pub event_channel_capacity: usize,
    /// Capacity of the coordinator command mailbox.
    pub command_channel_capacity: usize,
    /// Capacity of the coordinator event broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            renewal_lead: DEFAULT_RENEWAL_LEAD,
            renewal_backoff_base: DEFAULT_RENEWAL_BACKOFF_BASE,
            renewal_backoff_cap: DEFAULT_RENEWAL_BACKOFF_CAP,
            renewal_max_attempts: DEFAULT_RENEWAL_MAX_ATTEMPTS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            command_channel_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable values.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = vars.get("COORDINATOR_RENEWAL_LEAD_SECONDS") {
            config.renewal_lead = Duration::from_secs(parse_u64(value, "COORDINATOR_RENEWAL_LEAD_SECONDS")?);
        }
        if let Some(value) = vars.get("COORDINATOR_RENEWAL_BACKOFF_BASE_SECONDS") {
            config.renewal_backoff_base =
                Duration::from_secs(parse_u64(value, "COORDINATOR_RENEWAL_BACKOFF_BASE_SECONDS")?);
        }
        if let Some(value) = vars.get("COORDINATOR_RENEWAL_BACKOFF_CAP_SECONDS") {
            config.renewal_backoff_cap =
                Duration::from_secs(parse_u64(value, "COORDINATOR_RENEWAL_BACKOFF_CAP_SECONDS")?);
        }
        if let Some(value) = vars.get("COORDINATOR_RENEWAL_MAX_ATTEMPTS") {
            config.renewal_max_attempts = value.parse().map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "COORDINATOR_RENEWAL_MAX_ATTEMPTS: not a number: {value}"
                ))
            })?;
        }
        if let Some(value) = vars.get("COORDINATOR_EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity =
                parse_capacity(value, "COORDINATOR_EVENT_CHANNEL_CAPACITY")?;
        }
        if let Some(value) = vars.get("COORDINATOR_COMMAND_CHANNEL_CAPACITY") {
            config.command_channel_capacity =
                parse_capacity(value, "COORDINATOR_COMMAND_CHANNEL_CAPACITY")?;
        }

        if config.renewal_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "COORDINATOR_RENEWAL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Set the renewal lead time.
    #[must_use]
    pub fn with_renewal_lead(mut self, lead: Duration) -> Self {
        self.renewal_lead = lead;
        self
    }

    /// Set the renewal backoff base delay.
    #[must_use]
    pub fn with_renewal_backoff_base(mut self, base: Duration) -> Self {
        self.renewal_backoff_base = base;
        self
    }

    /// Set the maximum renewal attempts.
    #[must_use]
    pub fn with_renewal_max_attempts(mut self, attempts: u32) -> Self {
        self.renewal_max_attempts = attempts;
        self
    }
}

fn parse_u64(value: &str, var: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{var}: not a number: {value}")))
}

fn parse_capacity(value: &str, var: &str) -> Result<usize, ConfigError> {
    let capacity: usize = value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{var}: not a number: {value}")))?;
    if capacity == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{var}: capacity must be at least 1"
        )));
    }
    Ok(capacity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.renewal_lead, Duration::from_secs(30));
        assert_eq!(config.renewal_backoff_base, Duration::from_secs(2));
        assert_eq!(config.renewal_backoff_cap, Duration::from_secs(30));
        assert_eq!(config.renewal_max_attempts, 5);
    }

    #[test]
    fn test_from_vars_overrides() {
        let mut vars = HashMap::new();
        vars.insert(
            "COORDINATOR_RENEWAL_LEAD_SECONDS".to_string(),
            "10".to_string(),
        );
        vars.insert(
            "COORDINATOR_RENEWAL_MAX_ATTEMPTS".to_string(),
            "3".to_string(),
        );

        let config = CoordinatorConfig::from_vars(&vars).unwrap();
        assert_eq!(config.renewal_lead, Duration::from_secs(10));
        assert_eq!(config.renewal_max_attempts, 3);
        // Untouched values keep defaults
        assert_eq!(config.renewal_backoff_cap, Duration::from_secs(30));
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let mut vars = HashMap::new();
        vars.insert(
            "COORDINATOR_RENEWAL_LEAD_SECONDS".to_string(),
            "soon".to_string(),
        );

        let result = CoordinatorConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_from_vars_rejects_zero_attempts() {
        let mut vars = HashMap::new();
        vars.insert(
            "COORDINATOR_RENEWAL_MAX_ATTEMPTS".to_string(),
            "0".to_string(),
        );

        let result = CoordinatorConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_builder_style_overrides() {
        let config = CoordinatorConfig::default()
            .with_renewal_lead(Duration::from_secs(5))
            .with_renewal_max_attempts(2);

        assert_eq!(config.renewal_lead, Duration::from_secs(5));
        assert_eq!(config.renewal_max_attempts, 2);
    }
}
