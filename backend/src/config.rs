//! Service configuration loaded via OrthoConfig.
//!
//! Every value can come from `SCHEDULER_*` environment variables, a config
//! file, or the command line. Connection strings have no default; everything
//! else falls back to production-sane values.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{ReminderSweepConfig, SchedulingLifecycleConfig};
use crate::outbound::persistence::PoolConfig;
use crate::outbound::queue::DispatcherConfig;

const DEFAULT_GEOCODING_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_GEOCODING_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;
const DEFAULT_REMINDER_PERIOD_SECS: u64 = 3_600;
const DEFAULT_REMINDER_LOOKAHEAD_SECS: u64 = 86_400;
const MAX_REMINDER_LOOKAHEAD_SECS: u64 = 10 * 365 * 86_400;
const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 1_024;
const DEFAULT_EVENT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_POOL_MAX_SIZE: u32 = 10;
const REDIS_POOL_MAX_SIZE: u32 = 16;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// A setting that is missing or does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A required value was not supplied.
    #[error("missing required setting {name}")]
    Missing {
        /// Setting name, as the environment variable.
        name: &'static str,
    },
    /// A value was supplied but is unusable.
    #[error("invalid setting {name}: {message}")]
    Invalid {
        /// Setting name, as the environment variable.
        name: &'static str,
        /// Parser message.
        message: String,
    },
}

/// Settings for the scheduler binary.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SCHEDULER")]
pub struct SchedulerSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Redis connection string for the cache and event lists.
    pub redis_url: Option<String>,
    /// Base URL of the Nominatim-compatible geocoder.
    #[ortho_config(default = DEFAULT_GEOCODING_BASE_URL.to_owned())]
    pub geocoding_base_url: Option<String>,
    /// Per-call geocoding timeout in milliseconds.
    #[ortho_config(default = DEFAULT_GEOCODING_TIMEOUT_MS)]
    pub geocoding_timeout_ms: Option<u64>,
    /// View cache time-to-live in seconds.
    #[ortho_config(default = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,
    /// Seconds between reminder sweeps.
    #[ortho_config(default = DEFAULT_REMINDER_PERIOD_SECS)]
    pub reminder_period_secs: Option<u64>,
    /// Reminder window in seconds, capped at ten years.
    #[ortho_config(default = DEFAULT_REMINDER_LOOKAHEAD_SECS)]
    pub reminder_lookahead_secs: Option<u64>,
    /// Events held in memory while the channel is slow or down.
    #[ortho_config(default = DEFAULT_EVENT_BUFFER_CAPACITY)]
    pub event_buffer_capacity: Option<usize>,
    /// Delivery attempts per event while draining at shutdown.
    #[ortho_config(default = DEFAULT_EVENT_MAX_ATTEMPTS)]
    pub event_max_attempts: Option<u32>,
    /// HTTP listen address for probes and metrics.
    #[ortho_config(default = DEFAULT_BIND_ADDR.to_owned())]
    pub bind_addr: Option<String>,
    /// Maximum PostgreSQL connections.
    #[ortho_config(default = DEFAULT_DB_POOL_MAX_SIZE)]
    pub db_pool_max_size: Option<u32>,
}

impl SchedulerSettings {
    /// PostgreSQL connection string.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] when unset or blank.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        required(self.database_url.as_deref(), "SCHEDULER_DATABASE_URL")
    }

    /// Redis connection string.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] when unset or blank.
    pub fn redis_url(&self) -> Result<&str, SettingsError> {
        required(self.redis_url.as_deref(), "SCHEDULER_REDIS_URL")
    }

    /// Geocoder base URL, defaulting to the public Nominatim instance.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] when the value is not a URL.
    pub fn geocoding_base_url(&self) -> Result<Url, SettingsError> {
        let raw = self
            .geocoding_base_url
            .as_deref()
            .unwrap_or(DEFAULT_GEOCODING_BASE_URL);
        Url::parse(raw).map_err(|err| SettingsError::Invalid {
            name: "SCHEDULER_GEOCODING_BASE_URL",
            message: err.to_string(),
        })
    }

    /// Per-call geocoding timeout.
    pub fn geocoding_timeout(&self) -> Duration {
        Duration::from_millis(
            self.geocoding_timeout_ms
                .unwrap_or(DEFAULT_GEOCODING_TIMEOUT_MS),
        )
    }

    /// HTTP listen address.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] when the value is not `host:port`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|err: std::net::AddrParseError| SettingsError::Invalid {
                name: "SCHEDULER_BIND_ADDR",
                message: err.to_string(),
            })
    }

    /// Lifecycle service tunables.
    pub fn lifecycle_config(&self) -> SchedulingLifecycleConfig {
        SchedulingLifecycleConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
            enrichment_timeout: self.geocoding_timeout(),
        }
    }

    /// Reminder sweep schedule and window.
    pub fn reminder_config(&self) -> ReminderSweepConfig {
        ReminderSweepConfig {
            period: Duration::from_secs(
                self.reminder_period_secs
                    .unwrap_or(DEFAULT_REMINDER_PERIOD_SECS)
                    .max(1),
            ),
            lookahead: Duration::from_secs(
                self.reminder_lookahead_secs
                    .unwrap_or(DEFAULT_REMINDER_LOOKAHEAD_SECS)
                    .min(MAX_REMINDER_LOOKAHEAD_SECS),
            ),
        }
    }

    /// Event dispatcher buffer and retry policy.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            capacity: self
                .event_buffer_capacity
                .unwrap_or(DEFAULT_EVENT_BUFFER_CAPACITY)
                .max(1),
            max_attempts: self
                .event_max_attempts
                .unwrap_or(DEFAULT_EVENT_MAX_ATTEMPTS)
                .max(1),
            ..DispatcherConfig::default()
        }
    }

    /// PostgreSQL pool configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Missing`] when no database URL is set.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        Ok(PoolConfig::new(self.database_url()?)
            .with_max_size(
                self.db_pool_max_size
                    .unwrap_or(DEFAULT_DB_POOL_MAX_SIZE)
                    .max(1),
            )
            .with_connection_timeout(CONNECTION_TIMEOUT))
    }

    /// Redis pool size.
    pub fn redis_pool_max_size(&self) -> u32 {
        REDIS_POOL_MAX_SIZE
    }

    /// Checkout timeout shared by both pools.
    pub fn connection_timeout(&self) -> Duration {
        CONNECTION_TIMEOUT
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, SettingsError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SettingsError::Missing { name })
}

#[cfg(test)]
mod tests {
    //! Unit tests for scheduler settings parsing and defaults.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 11] = [
        "SCHEDULER_DATABASE_URL",
        "SCHEDULER_REDIS_URL",
        "SCHEDULER_GEOCODING_BASE_URL",
        "SCHEDULER_GEOCODING_TIMEOUT_MS",
        "SCHEDULER_CACHE_TTL_SECS",
        "SCHEDULER_REMINDER_PERIOD_SECS",
        "SCHEDULER_REMINDER_LOOKAHEAD_SECS",
        "SCHEDULER_EVENT_BUFFER_CAPACITY",
        "SCHEDULER_EVENT_MAX_ATTEMPTS",
        "SCHEDULER_BIND_ADDR",
        "SCHEDULER_DB_POOL_MAX_SIZE",
    ];

    fn cleared() -> Vec<(&'static str, Option<String>)> {
        VARS.iter().map(|name| (*name, None)).collect()
    }

    fn with_overrides(
        overrides: &[(&'static str, &str)],
    ) -> Vec<(&'static str, Option<String>)> {
        let mut vars = cleared();
        for (name, value) in overrides {
            if let Some(slot) = vars.iter_mut().find(|(var, _)| var == name) {
                slot.1 = Some((*value).to_owned());
            }
        }
        vars
    }

    fn load_from_empty_args() -> SchedulerSettings {
        SchedulerSettings::load_from_iter([OsString::from("scheduler")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(cleared());

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url(),
            Err(SettingsError::Missing {
                name: "SCHEDULER_DATABASE_URL"
            })
        );
        assert_eq!(
            settings.bind_addr().expect("default parses"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("literal")
        );
        assert_eq!(
            settings.lifecycle_config(),
            SchedulingLifecycleConfig {
                cache_ttl: Duration::from_secs(86_400),
                enrichment_timeout: Duration::from_millis(2_000),
            }
        );
        assert_eq!(settings.reminder_config(), ReminderSweepConfig::default());
        let dispatcher = settings.dispatcher_config();
        assert_eq!(dispatcher.capacity, 1_024);
        assert_eq!(dispatcher.max_attempts, 5);
        assert_eq!(
            settings.geocoding_base_url().expect("default parses").as_str(),
            "https://nominatim.openstreetmap.org/"
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(with_overrides(&[
            ("SCHEDULER_DATABASE_URL", "postgres://db/scheduler"),
            ("SCHEDULER_REDIS_URL", "redis://cache:6379"),
            ("SCHEDULER_CACHE_TTL_SECS", "60"),
            ("SCHEDULER_REMINDER_PERIOD_SECS", "300"),
            ("SCHEDULER_REMINDER_LOOKAHEAD_SECS", "7200"),
            ("SCHEDULER_EVENT_MAX_ATTEMPTS", "2"),
            ("SCHEDULER_BIND_ADDR", "127.0.0.1:9000"),
        ]));

        let settings = load_from_empty_args();
        assert_eq!(settings.database_url(), Ok("postgres://db/scheduler"));
        assert_eq!(settings.redis_url(), Ok("redis://cache:6379"));
        assert_eq!(
            settings.lifecycle_config().cache_ttl,
            Duration::from_secs(60)
        );
        assert_eq!(
            settings.reminder_config(),
            ReminderSweepConfig {
                period: Duration::from_secs(300),
                lookahead: Duration::from_secs(7_200),
            }
        );
        assert_eq!(settings.dispatcher_config().max_attempts, 2);
        assert_eq!(
            settings.bind_addr().expect("override parses").port(),
            9_000
        );
        let pool = settings.pool_config().expect("database url set");
        assert_eq!(pool.database_url(), "postgres://db/scheduler");
    }

    #[rstest]
    #[case::blank(Some("   "))]
    #[case::unset(None)]
    fn blank_connection_strings_are_missing(#[case] value: Option<&str>) {
        let settings = SchedulerSettings {
            redis_url: value.map(str::to_owned),
            ..SchedulerSettings::default()
        };
        assert!(matches!(
            settings.redis_url(),
            Err(SettingsError::Missing { .. })
        ));
    }

    #[rstest]
    #[case::bind("bind", "not-an-address")]
    #[case::geocoder("geo", "::nope")]
    fn malformed_values_are_invalid(#[case] field: &str, #[case] raw: &str) {
        let mut settings = SchedulerSettings::default();
        let result = if field == "bind" {
            settings.bind_addr = Some(raw.to_owned());
            settings.bind_addr().map(|_| ())
        } else {
            settings.geocoding_base_url = Some(raw.to_owned());
            settings.geocoding_base_url().map(|_| ())
        };
        assert!(matches!(result, Err(SettingsError::Invalid { .. })));
    }

    #[rstest]
    fn zero_sizes_are_raised_to_one() {
        let settings = SchedulerSettings {
            event_buffer_capacity: Some(0),
            event_max_attempts: Some(0),
            reminder_period_secs: Some(0),
            ..SchedulerSettings::default()
        };
        assert_eq!(settings.dispatcher_config().capacity, 1);
        assert_eq!(settings.dispatcher_config().max_attempts, 1);
        assert_eq!(settings.reminder_config().period, Duration::from_secs(1));
    }

    #[rstest]
    fn oversized_lookahead_is_capped() {
        let settings = SchedulerSettings {
            reminder_lookahead_secs: Some(u64::MAX),
            ..SchedulerSettings::default()
        };
        assert_eq!(
            settings.reminder_config().lookahead,
            Duration::from_secs(MAX_REMINDER_LOOKAHEAD_SECS)
        );
    }
}
