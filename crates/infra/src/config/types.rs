//! Configuration value types.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cadence_common::retry::{
    BackoffRetryPolicyFactory, BackoffStrategy, Jitter, NoRetryPolicyFactory, PolicyFactory,
    SimpleRetryPolicyFactory,
};
use cadence_common::retry::constants::{DEFAULT_FREQUENCY, DEFAULT_RETRY_COUNT};
use cadence_common::TimeUnit;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

/// Fixed-frequency trigger settings.
///
/// `frequency` and `start_delay` are counted in `time_unit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedFrequencyConfig {
    pub frequency: u64,
    pub start_delay: u64,
    pub time_unit: TimeUnit,
    /// Upper bound for one job run, in milliseconds
    pub job_timeout_ms: Option<u64>,
}

impl Default for FixedFrequencyConfig {
    fn default() -> Self {
        Self { frequency: 1000, start_delay: 0, time_unit: TimeUnit::Milliseconds, job_timeout_ms: None }
    }
}

impl FixedFrequencyConfig {
    pub fn period(&self) -> Duration {
        self.time_unit.to_duration(self.frequency)
    }

    pub fn initial_delay(&self) -> Duration {
        self.time_unit.to_duration(self.start_delay)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.period().is_zero() {
            return Err(ConfigError::invalid("frequency", "must be greater than zero"));
        }
        validate_timeout(self.job_timeout_ms)
    }
}

/// Cron trigger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronConfig {
    /// Six or seven field expression, seconds first
    pub expression: String,
    /// IANA zone name; unset means UTC, unknown names fall back to GMT
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub job_timeout_ms: Option<u64>,
}

impl CronConfig {
    pub fn new<S: Into<String>>(expression: S) -> Self {
        Self { expression: expression.into(), time_zone: None, job_timeout_ms: None }
    }

    pub fn with_time_zone<S: Into<String>>(mut self, time_zone: S) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.expression.trim().is_empty() {
            return Err(ConfigError::invalid("expression", "must not be empty"));
        }
        validate_timeout(self.job_timeout_ms)
    }
}

fn validate_timeout(timeout_ms: Option<u64>) -> ConfigResult<()> {
    match timeout_ms {
        Some(0) => Err(ConfigError::invalid("job_timeout_ms", "must be greater than zero")),
        _ => Ok(()),
    }
}

/// Jitter applied to backoff delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterConfig {
    #[default]
    None,
    Full,
    Equal,
}

impl From<JitterConfig> for Jitter {
    fn from(config: JitterConfig) -> Self {
        match config {
            JitterConfig::None => Jitter::None,
            JitterConfig::Full => Jitter::Full,
            JitterConfig::Equal => Jitter::Equal,
        }
    }
}

/// Retry policy selection.
///
/// ```toml
/// [retry]
/// policy = "simple"
/// count = 3
/// frequency_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicyConfig {
    /// Give up on the first failure
    None,
    /// Fixed number of retries with a fixed pause
    Simple {
        #[serde(default = "default_retry_count")]
        count: i32,
        #[serde(default = "default_frequency_ms")]
        frequency_ms: u64,
    },
    /// Retry until success
    Forever {
        #[serde(default = "default_frequency_ms")]
        frequency_ms: u64,
    },
    /// Exponential backoff with optional jitter
    Backoff {
        max_retries: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        #[serde(default)]
        jitter: JitterConfig,
    },
}

fn default_retry_count() -> i32 {
    DEFAULT_RETRY_COUNT
}

fn default_frequency_ms() -> u64 {
    DEFAULT_FREQUENCY.as_millis() as u64
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self::Simple { count: default_retry_count(), frequency_ms: default_frequency_ms() }
    }
}

impl RetryPolicyConfig {
    /// Build the policy factory this configuration describes.
    pub fn to_policy_factory(&self) -> ConfigResult<Arc<dyn PolicyFactory>> {
        let factory: Arc<dyn PolicyFactory> = match self {
            Self::None => Arc::new(NoRetryPolicyFactory),
            Self::Simple { count, frequency_ms } => Arc::new(
                SimpleRetryPolicyFactory::new(*count, Duration::from_millis(*frequency_ms))
                    .map_err(|err| ConfigError::invalid("retry.count", err.to_string()))?,
            ),
            Self::Forever { frequency_ms } => {
                Arc::new(SimpleRetryPolicyFactory::forever(Duration::from_millis(*frequency_ms)))
            }
            Self::Backoff { max_retries, initial_delay_ms, max_delay_ms, multiplier, jitter } => {
                if *multiplier < 1.0 || !multiplier.is_finite() {
                    return Err(ConfigError::invalid("retry.multiplier", "must be a finite value >= 1.0"));
                }
                if max_delay_ms < initial_delay_ms {
                    return Err(ConfigError::invalid(
                        "retry.max_delay_ms",
                        "must not be smaller than initial_delay_ms",
                    ));
                }
                let backoff = BackoffStrategy::Exponential {
                    initial_delay: Duration::from_millis(*initial_delay_ms),
                    base: *multiplier,
                    max_delay: Duration::from_millis(*max_delay_ms),
                };
                Arc::new(
                    BackoffRetryPolicyFactory::new(*max_retries, backoff)
                        .with_jitter((*jitter).into()),
                )
            }
        };
        Ok(factory)
    }
}

/// How one configured scheduler is triggered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerConfig<'a> {
    FixedFrequency(&'a FixedFrequencyConfig),
    Cron(&'a CronConfig),
}

/// One named scheduler. Exactly one of `fixed_frequency` and `cron` must be
/// set.
///
/// ```toml
/// [[schedulers]]
/// name = "orders.polling.1"
///
/// [schedulers.fixed_frequency]
/// frequency = 5
/// time_unit = "seconds"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_frequency: Option<FixedFrequencyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<CronConfig>,
}

impl SchedulerDefinition {
    pub fn trigger(&self) -> ConfigResult<TriggerConfig<'_>> {
        match (&self.fixed_frequency, &self.cron) {
            (Some(fixed), None) => Ok(TriggerConfig::FixedFrequency(fixed)),
            (None, Some(cron)) => Ok(TriggerConfig::Cron(cron)),
            _ => Err(ConfigError::invalid(
                format!("schedulers.{}", self.name),
                "exactly one of fixed_frequency or cron must be set",
            )),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("schedulers.name", "must not be empty"));
        }
        match self.trigger()? {
            TriggerConfig::FixedFrequency(fixed) => fixed.validate(),
            TriggerConfig::Cron(cron) => cron.validate(),
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub schedulers: Vec<SchedulerDefinition>,
    #[serde(default)]
    pub retry: RetryPolicyConfig,
}

impl SchedulingConfig {
    /// Validate every definition and reject duplicate names.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for definition in &self.schedulers {
            definition.validate()?;
            if !seen.insert(definition.name.as_str()) {
                return Err(ConfigError::invalid(
                    "schedulers.name",
                    format!("duplicate scheduler name '{}'", definition.name),
                ));
            }
        }
        self.retry.to_policy_factory().map(|_| ())
    }

    pub fn scheduler(&self, name: &str) -> Option<&SchedulerDefinition> {
        self.schedulers.iter().find(|definition| definition.name == name)
    }
}
