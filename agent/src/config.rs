//! Agent configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use shared::config::{Credential, PipelineConfig};
use shared::models::{RecordKind, Resource};
use shared::sampler::Sampler;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Agent configuration.
///
/// Configuration values can be set via environment variables:
/// - `OUTPOST_HOST`: The host address to bind to (default: "127.0.0.1")
/// - `OUTPOST_PORT`: The port to listen on (default: 8080)
/// - `OUTPOST_ENDPOINT`: Collector base URL (default: `http://localhost:4318`)
/// - `OUTPOST_AUTH_TOKEN`: Bearer token sent to the collector
/// - `OUTPOST_AUTHORIZATION`: Raw `Authorization` header value, wins over the token
/// - `OUTPOST_SERVICE_NAME`: `service.name` of the exported resource
/// - `OUTPOST_FLUSH_INTERVAL_MS`, `OUTPOST_MAX_BATCH_SIZE`, `OUTPOST_MAX_QUEUE_SIZE`:
///   batching settings applied to every kind
/// - `OUTPOST_MAX_RETRIES`: Retries after the first failed attempt
/// - `OUTPOST_EXPORT_TIMEOUT_MS`: Per-request timeout
/// - `OUTPOST_OVERFLOW_POLICY`: `drop_oldest` or `drop_newest`
/// - `OUTPOST_SAMPLER`: `exclude_log_export`, `always_on` or `always_off`
/// - `OUTPOST_SHUTDOWN_TIMEOUT_MS`: Grace period for the final flush (default: 5000)
/// - `OUTPOST_DISABLED_KINDS`: Comma-separated kinds not to export, e.g. `metrics,logs`
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Export pipeline settings.
    pub pipeline: PipelineConfig,
    /// Sampling policy applied before buffering.
    pub sampler: Sampler,
    /// How long shutdown waits for buffered telemetry to flush.
    pub shutdown_timeout_ms: u64,
}

impl AgentConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or the
    /// resulting pipeline configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("OUTPOST_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "OUTPOST_PORT")? {
            config.port = port;
        }
        if let Some(timeout) = parse_var(&lookup, "OUTPOST_SHUTDOWN_TIMEOUT_MS")? {
            config.shutdown_timeout_ms = timeout;
        }
        if let Some(sampler) = parse_var(&lookup, "OUTPOST_SAMPLER")? {
            config.sampler = sampler;
        }

        let pipeline = &mut config.pipeline;
        if let Some(endpoint) = lookup("OUTPOST_ENDPOINT") {
            pipeline.endpoint = endpoint;
        }
        pipeline.credential = match (lookup("OUTPOST_AUTHORIZATION"), lookup("OUTPOST_AUTH_TOKEN")) {
            (Some(raw), _) => Some(Credential::Raw(raw)),
            (None, Some(token)) => Some(Credential::Bearer(token)),
            (None, None) => None,
        };
        if let Some(service_name) = lookup("OUTPOST_SERVICE_NAME") {
            pipeline.resource = Resource::new(service_name);
        }
        if let Some(retries) = parse_var(&lookup, "OUTPOST_MAX_RETRIES")? {
            pipeline.retry.max_retries = retries;
        }
        if let Some(timeout) = parse_var(&lookup, "OUTPOST_EXPORT_TIMEOUT_MS")? {
            pipeline.export_timeout_ms = timeout;
        }
        if let Some(policy) = parse_var(&lookup, "OUTPOST_OVERFLOW_POLICY")? {
            pipeline.overflow_policy = policy;
        }

        let flush_interval_ms = parse_var::<u64>(&lookup, "OUTPOST_FLUSH_INTERVAL_MS")?;
        let max_batch_size = parse_var::<usize>(&lookup, "OUTPOST_MAX_BATCH_SIZE")?;
        let max_queue_size = parse_var::<usize>(&lookup, "OUTPOST_MAX_QUEUE_SIZE")?;
        pipeline.for_each_kind(|settings| {
            if let Some(interval) = flush_interval_ms {
                settings.flush_interval_ms = interval;
            }
            if let Some(size) = max_batch_size {
                settings.max_batch_size = size;
            }
            if let Some(size) = max_queue_size {
                settings.max_queue_size = size;
            }
        });

        if let Some(disabled) = lookup("OUTPOST_DISABLED_KINDS") {
            for name in disabled.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let kind = RecordKind::from_str(name).context("Invalid OUTPOST_DISABLED_KINDS")?;
                pipeline.kind_mut(kind).enabled = false;
            }
        }

        config
            .pipeline
            .validate()
            .context("Invalid pipeline configuration")?;
        Ok(config)
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Returns the shutdown grace period as a `Duration`.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            pipeline: PipelineConfig::default(),
            sampler: Sampler::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {key}: {value}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::OverflowPolicy;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_default_values() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.sampler.to_string(), "custom sampler");
    }

    #[test]
    fn test_config_reads_every_variable() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("OUTPOST_HOST", "0.0.0.0"),
            ("OUTPOST_PORT", "9090"),
            ("OUTPOST_ENDPOINT", "https://collector.internal:4318"),
            ("OUTPOST_AUTH_TOKEN", "sk_live"),
            ("OUTPOST_SERVICE_NAME", "checkout"),
            ("OUTPOST_FLUSH_INTERVAL_MS", "250"),
            ("OUTPOST_MAX_BATCH_SIZE", "64"),
            ("OUTPOST_MAX_QUEUE_SIZE", "256"),
            ("OUTPOST_MAX_RETRIES", "5"),
            ("OUTPOST_EXPORT_TIMEOUT_MS", "2000"),
            ("OUTPOST_OVERFLOW_POLICY", "drop_newest"),
            ("OUTPOST_SAMPLER", "always_on"),
            ("OUTPOST_SHUTDOWN_TIMEOUT_MS", "1500"),
            ("OUTPOST_DISABLED_KINDS", "metrics, logs"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9090");
        assert_eq!(config.pipeline.endpoint, "https://collector.internal:4318");
        assert_eq!(
            config.pipeline.credential,
            Some(Credential::Bearer("sk_live".to_string()))
        );
        assert_eq!(config.pipeline.resource.service_name(), Some("checkout"));
        assert_eq!(config.pipeline.traces.flush_interval_ms, 250);
        assert_eq!(config.pipeline.traces.max_batch_size, 64);
        assert_eq!(config.pipeline.logs.max_queue_size, 256);
        assert_eq!(config.pipeline.retry.max_retries, 5);
        assert_eq!(config.pipeline.export_timeout_ms, 2000);
        assert_eq!(config.pipeline.overflow_policy, OverflowPolicy::DropNewest);
        assert_eq!(config.sampler.to_string(), "always_on");
        assert_eq!(config.shutdown_timeout_ms, 1500);
        assert!(config.pipeline.traces.enabled);
        assert!(!config.pipeline.metrics.enabled);
        assert!(!config.pipeline.logs.enabled);
    }

    #[test]
    fn test_raw_authorization_wins_over_token() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("OUTPOST_AUTH_TOKEN", "sk_live"),
            ("OUTPOST_AUTHORIZATION", "Basic abc"),
        ]))
        .unwrap();

        assert_eq!(
            config.pipeline.credential,
            Some(Credential::Raw("Basic abc".to_string()))
        );
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = AgentConfig::from_lookup(lookup(&[("OUTPOST_PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("OUTPOST_PORT"));
    }

    #[test]
    fn test_unknown_sampler_is_rejected() {
        assert!(AgentConfig::from_lookup(lookup(&[("OUTPOST_SAMPLER", "sometimes")])).is_err());
    }

    #[test]
    fn test_unknown_disabled_kind_is_rejected() {
        assert!(AgentConfig::from_lookup(lookup(&[("OUTPOST_DISABLED_KINDS", "events")])).is_err());
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let err =
            AgentConfig::from_lookup(lookup(&[("OUTPOST_ENDPOINT", "collector:4318")])).unwrap_err();
        assert!(format!("{err:#}").contains("collector:4318"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        assert!(AgentConfig::from_lookup(lookup(&[("OUTPOST_MAX_BATCH_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_config_socket_addr() {
        let config = AgentConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..AgentConfig::default()
        };
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let config = AgentConfig {
            host: "not a host".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
