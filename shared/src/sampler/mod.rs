//! Sampling policies.
//!
//! A [`Sampler`] decides, per record, whether it enters the pipeline. Deciding
//! is a pure function of the record: no I/O, no shared state, so it can run on
//! the producer's thread.
//!
//! The default policy drops records of the pipeline's own log exports,
//! recognized by a destination URL ending in `/v1/logs`.

use crate::config::ConfigError;
use crate::models::{AttributeValue, Attributes, Record};
use std::str::FromStr;

/// Collector path for log ingestion.
pub const LOG_EXPORT_PATH: &str = "/v1/logs";

/// Attributes holding the destination URL of an outgoing HTTP call.
pub const DESTINATION_ATTRIBUTES: [&str; 2] = ["http.url", "url.full"];

/// The outcome of sampling a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SamplingDecision {
    /// Whether the record enters the pipeline.
    pub keep: bool,
    /// Attributes replacing the record's own, if any.
    pub attributes_override: Option<Attributes>,
}

impl SamplingDecision {
    /// Keep the record unchanged.
    #[must_use]
    pub fn keep() -> Self {
        Self {
            keep: true,
            attributes_override: None,
        }
    }

    /// Keep the record with replaced attributes.
    #[must_use]
    pub fn keep_with(attributes: Attributes) -> Self {
        Self {
            keep: true,
            attributes_override: Some(attributes),
        }
    }

    /// Drop the record.
    #[must_use]
    pub fn discard() -> Self {
        Self {
            keep: false,
            attributes_override: None,
        }
    }
}

/// Signature of a custom sampling function.
pub type DecideFn = fn(&Record) -> SamplingDecision;

/// A named sampling policy.
///
/// # Example
///
/// ```
/// use shared::models::Record;
/// use shared::sampler::Sampler;
///
/// let sampler = Sampler::exclude_log_export();
/// let export_call = Record::span("t1", serde_json::json!({}))
///     .with_attribute("http.url", "https://collector:4318/v1/logs");
///
/// assert!(!sampler.decide(&export_call).keep);
/// ```
#[derive(Clone)]
pub enum Sampler {
    /// Keep every record.
    AlwaysOn,
    /// Drop every record.
    AlwaysOff,
    /// Drop records whose destination attribute ends with `suffix`.
    ExcludeDestination {
        /// Attributes inspected, in order.
        attributes: Vec<String>,
        /// Destination suffix that marks a record for dropping.
        suffix: String,
    },
    /// A caller-provided decision function.
    Custom {
        /// Name reported in logs.
        name: &'static str,
        /// The decision function.
        decide: DecideFn,
    },
    /// Every inner policy must keep the record; overrides are merged in order.
    All(Vec<Sampler>),
}

impl Sampler {
    /// The policy that drops the pipeline's own log-export calls.
    #[must_use]
    pub fn exclude_log_export() -> Self {
        Self::ExcludeDestination {
            attributes: DESTINATION_ATTRIBUTES.iter().map(ToString::to_string).collect(),
            suffix: LOG_EXPORT_PATH.to_string(),
        }
    }

    /// Decides whether `record` is kept.
    #[must_use]
    pub fn decide(&self, record: &Record) -> SamplingDecision {
        match self {
            Self::AlwaysOn => SamplingDecision::keep(),
            Self::AlwaysOff => SamplingDecision::discard(),
            Self::ExcludeDestination { attributes, suffix } => {
                let matches = attributes.iter().any(|key| {
                    record
                        .attribute(key)
                        .and_then(AttributeValue::as_str)
                        .is_some_and(|destination| destination.ends_with(suffix.as_str()))
                });
                if matches {
                    SamplingDecision::discard()
                } else {
                    SamplingDecision::keep()
                }
            }
            Self::Custom { decide, .. } => decide(record),
            Self::All(samplers) => {
                let mut merged: Option<Attributes> = None;
                for sampler in samplers {
                    let decision = sampler.decide(record);
                    if !decision.keep {
                        return SamplingDecision::discard();
                    }
                    if let Some(attributes) = decision.attributes_override {
                        merged.get_or_insert_with(Attributes::new).extend(attributes);
                    }
                }
                SamplingDecision {
                    keep: true,
                    attributes_override: merged,
                }
            }
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::exclude_log_export()
    }
}

impl std::fmt::Display for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlwaysOn => write!(f, "always_on"),
            Self::AlwaysOff => write!(f, "always_off"),
            Self::ExcludeDestination { suffix, .. } if suffix == LOG_EXPORT_PATH => {
                write!(f, "custom sampler")
            }
            Self::ExcludeDestination { suffix, .. } => write!(f, "exclude_destination({suffix})"),
            Self::Custom { name, .. } => write!(f, "{name}"),
            Self::All(samplers) => {
                let names: Vec<String> = samplers.iter().map(ToString::to_string).collect();
                write!(f, "all({})", names.join(", "))
            }
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sampler({self})")
    }
}

impl FromStr for Sampler {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always_on" => Ok(Self::AlwaysOn),
            "always_off" => Ok(Self::AlwaysOff),
            "exclude_log_export" | "custom_sampler" | "custom sampler" => {
                Ok(Self::exclude_log_export())
            }
            other => Err(ConfigError::UnknownValue {
                field: "sampler",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use serde_json::json;

    fn client_span(url: &str) -> Record {
        Record::span("trace-1", json!({"name": "POST"})).with_attribute("http.url", url)
    }

    #[test]
    fn test_drops_log_export_calls() {
        let sampler = Sampler::exclude_log_export();

        let decision = sampler.decide(&client_span("https://otel.example.com:4318/v1/logs"));

        assert!(!decision.keep);
        assert!(decision.attributes_override.is_none());
    }

    #[test]
    fn test_drops_on_url_full_attribute() {
        let sampler = Sampler::exclude_log_export();
        let record = Record::span("trace-1", json!({}))
            .with_attribute("url.full", "http://localhost:4318/v1/logs");

        assert!(!sampler.decide(&record).keep);
    }

    #[test]
    fn test_keeps_trace_and_metric_export_calls() {
        let sampler = Sampler::exclude_log_export();

        assert!(sampler.decide(&client_span("https://collector/v1/traces")).keep);
        assert!(sampler.decide(&client_span("https://collector/v1/metrics")).keep);
    }

    #[test]
    fn test_keeps_when_suffix_is_not_at_end() {
        let sampler = Sampler::exclude_log_export();
        assert!(sampler.decide(&client_span("https://collector/v1/logs/extra")).keep);
    }

    #[test]
    fn test_keeps_when_attribute_missing_or_not_string() {
        let sampler = Sampler::exclude_log_export();

        let missing = Record::log(json!("plain log"));
        let numeric = Record::span("trace-1", json!({})).with_attribute("http.url", 42);

        assert_eq!(sampler.decide(&missing), SamplingDecision::keep());
        assert_eq!(sampler.decide(&numeric), SamplingDecision::keep());
    }

    #[test]
    fn test_applies_to_every_record_kind() {
        let sampler = Sampler::exclude_log_export();
        let metric = Record::metric(json!({})).with_attribute("http.url", "http://c/v1/logs");

        assert_eq!(metric.kind(), RecordKind::Metric);
        assert!(!sampler.decide(&metric).keep);
    }

    #[test]
    fn test_always_on_and_off() {
        let record = Record::log(json!("x"));
        assert!(Sampler::AlwaysOn.decide(&record).keep);
        assert!(!Sampler::AlwaysOff.decide(&record).keep);
    }

    #[test]
    fn test_custom_sampler() {
        fn only_errors(record: &Record) -> SamplingDecision {
            if record.attribute("error").is_some() {
                SamplingDecision::keep()
            } else {
                SamplingDecision::discard()
            }
        }
        let sampler = Sampler::Custom {
            name: "only_errors",
            decide: only_errors,
        };

        assert!(!sampler.decide(&Record::log(json!("ok"))).keep);
        assert!(sampler.decide(&Record::log(json!("bad")).with_attribute("error", true)).keep);
        assert_eq!(sampler.to_string(), "only_errors");
    }

    #[test]
    fn test_all_merges_overrides_and_first_drop_wins() {
        fn tag(_: &Record) -> SamplingDecision {
            SamplingDecision::keep_with(Attributes::from([(
                "sampled.by".to_string(),
                AttributeValue::from("tagger"),
            )]))
        }
        let tagger = Sampler::Custom {
            name: "tagger",
            decide: tag,
        };
        let sampler = Sampler::All(vec![Sampler::exclude_log_export(), tagger]);

        let kept = sampler.decide(&client_span("https://collector/v1/traces"));
        assert!(kept.keep);
        assert_eq!(
            kept.attributes_override
                .as_ref()
                .and_then(|attrs| attrs.get("sampled.by")),
            Some(&AttributeValue::from("tagger"))
        );

        let dropped = sampler.decide(&client_span("https://collector/v1/logs"));
        assert_eq!(dropped, SamplingDecision::discard());
    }

    #[test]
    fn test_sampler_from_str() {
        assert!(matches!("always_on".parse::<Sampler>(), Ok(Sampler::AlwaysOn)));
        assert!(matches!(
            "EXCLUDE_LOG_EXPORT".parse::<Sampler>(),
            Ok(Sampler::ExcludeDestination { .. })
        ));
        assert!(matches!(
            "custom sampler".parse::<Sampler>(),
            Ok(Sampler::ExcludeDestination { .. })
        ));
        assert_eq!(
            Sampler::default().to_string().parse::<Sampler>().unwrap().to_string(),
            Sampler::default().to_string()
        );
        assert!("probabilistic".parse::<Sampler>().is_err());
    }

    #[test]
    fn test_sampler_display() {
        assert_eq!(Sampler::default().to_string(), "custom sampler");
        assert_eq!(Sampler::exclude_log_export().to_string(), "custom sampler");
        assert_eq!(
            Sampler::ExcludeDestination {
                attributes: vec!["http.url".to_string()],
                suffix: "/v1/traces".to_string(),
            }
            .to_string(),
            "exclude_destination(/v1/traces)"
        );
        assert_eq!(
            Sampler::All(vec![Sampler::AlwaysOn, Sampler::AlwaysOff]).to_string(),
            "all(always_on, always_off)"
        );
    }
}
