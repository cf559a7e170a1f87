//! Rate-limit strategies (`ratelimit.strategy.<name>`).

use std::collections::BTreeMap;
use std::time::Duration;

use rpcgate_data::RecordId;
use serde::{Deserialize, Serialize};

use crate::acl::AccessAllowList;
use crate::domain::{ConfigDomain, DomainSnapshot, parse_json, render_json};
use crate::error::{ConfigError, ConfigResult};
use crate::namespace::RATE_LIMIT_STRATEGY_PREFIX;

/// Rule key applied to methods without a dedicated rule.
pub const DEFAULT_RULE_KEY: &str = "default";

/// Throttling algorithm a strategy asks the limiter to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    /// Fixed counting window per interval.
    #[default]
    FixedWindow,
    /// Token bucket refilled once per interval.
    TokenBucket,
}

/// Quota allowed per interval for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Window length in milliseconds.
    pub interval_ms: u64,
    /// Requests allowed per window.
    pub quota: u32,
}

impl RateLimitRule {
    /// Window length as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Named rate-limit strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStrategy {
    /// Record id; `0` until stored.
    pub id: RecordId,
    /// Logical name.
    pub name: String,
    /// Algorithm applied to every rule.
    pub algorithm: RateLimitAlgorithm,
    /// Rules keyed by RPC method, or [`DEFAULT_RULE_KEY`].
    pub rules: BTreeMap<String, RateLimitRule>,
}

impl RateLimitStrategy {
    /// Strategy without rules.
    #[must_use]
    pub fn new(name: impl Into<String>, algorithm: RateLimitAlgorithm) -> Self {
        Self {
            id: 0,
            name: name.into(),
            algorithm,
            rules: BTreeMap::new(),
        }
    }

    /// Add or replace the rule for `key`.
    #[must_use]
    pub fn with_rule(mut self, key: impl Into<String>, rule: RateLimitRule) -> Self {
        self.rules.insert(key.into(), rule);
        self
    }

    /// Rule governing `method`, falling back to the default rule.
    #[must_use]
    pub fn rule_for(&self, method: &str) -> Option<&RateLimitRule> {
        self.rules
            .get(method)
            .or_else(|| self.rules.get(DEFAULT_RULE_KEY))
    }
}

#[derive(Serialize, Deserialize)]
struct StrategyPayload {
    #[serde(default)]
    algo: RateLimitAlgorithm,
    #[serde(default)]
    rules: BTreeMap<String, RateLimitRule>,
}

fn validate_rules(name: &str, rules: &BTreeMap<String, RateLimitRule>) -> ConfigResult<()> {
    for (key, rule) in rules {
        if key.trim().is_empty() {
            return Err(invalid(name, "rule key must not be empty"));
        }
        if rule.interval_ms == 0 {
            return Err(invalid(name, format!("rule '{key}' has a zero interval")));
        }
        if rule.quota == 0 {
            return Err(invalid(name, format!("rule '{key}' has a zero quota")));
        }
    }
    Ok(())
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::invalid(RateLimitStrategy::KIND, name, reason)
}

impl ConfigDomain for RateLimitStrategy {
    const PREFIX: &'static str = RATE_LIMIT_STRATEGY_PREFIX;
    const KIND: &'static str = "rate-limit strategy";

    fn from_payload(id: RecordId, name: &str, value: &str) -> ConfigResult<Self> {
        let payload: StrategyPayload = parse_json(Self::KIND, name, value)?;
        validate_rules(name, &payload.rules)?;
        Ok(Self {
            id,
            name: name.to_string(),
            algorithm: payload.algo,
            rules: payload.rules,
        })
    }

    fn to_payload(&self) -> ConfigResult<String> {
        validate_rules(&self.name, &self.rules)?;
        render_json(
            Self::KIND,
            &self.name,
            &StrategyPayload {
                algo: self.algorithm,
                rules: self.rules.clone(),
            },
        )
    }

    fn logical_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> RecordId {
        self.id
    }
}

/// Everything a rate limiter polls: strategies and allow-lists with their fingerprints.
#[derive(Debug, Clone, Default)]
pub struct RateLimitConfig {
    /// Valid strategies keyed by record id.
    pub strategies: DomainSnapshot<RateLimitStrategy>,
    /// Valid allow-lists keyed by record id.
    pub allow_lists: DomainSnapshot<AccessAllowList>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcgate_data::ErrorKind;

    #[test]
    fn payload_defaults_to_fixed_window() {
        let strategy = RateLimitStrategy::from_payload(
            3,
            "public",
            r#"{"rules":{"default":{"interval_ms":1000,"quota":20}}}"#,
        )
        .expect("valid strategy");
        assert_eq!(strategy.id, 3);
        assert_eq!(strategy.algorithm, RateLimitAlgorithm::FixedWindow);
        assert_eq!(
            strategy.rule_for("eth_call").map(RateLimitRule::interval),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn method_rule_overrides_default() {
        let strategy = RateLimitStrategy::new("vip", RateLimitAlgorithm::TokenBucket)
            .with_rule(
                DEFAULT_RULE_KEY,
                RateLimitRule {
                    interval_ms: 1000,
                    quota: 100,
                },
            )
            .with_rule(
                "eth_getLogs",
                RateLimitRule {
                    interval_ms: 1000,
                    quota: 5,
                },
            );
        assert_eq!(strategy.rule_for("eth_getLogs").map(|r| r.quota), Some(5));
        assert_eq!(strategy.rule_for("eth_call").map(|r| r.quota), Some(100));

        let payload = strategy.to_payload().expect("payload");
        let decoded = RateLimitStrategy::from_payload(9, "vip", &payload).expect("decode");
        assert_eq!(decoded.algorithm, RateLimitAlgorithm::TokenBucket);
        assert_eq!(decoded.rules, strategy.rules);
    }

    #[test]
    fn zero_quota_or_interval_is_rejected() {
        for value in [
            r#"{"rules":{"default":{"interval_ms":0,"quota":1}}}"#,
            r#"{"rules":{"default":{"interval_ms":10,"quota":0}}}"#,
            r#"{"rules":{" ":{"interval_ms":10,"quota":1}}}"#,
        ] {
            let err = RateLimitStrategy::from_payload(1, "bad", value).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPayload { .. }), "{value}");
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let err = RateLimitStrategy::from_payload(1, "bad", r#"{"algo":"leaky"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedPayload { .. }));
    }

    #[test]
    fn invalid_strategy_cannot_be_encoded() {
        let strategy = RateLimitStrategy::new("broken", RateLimitAlgorithm::FixedWindow)
            .with_rule(
                DEFAULT_RULE_KEY,
                RateLimitRule {
                    interval_ms: 0,
                    quota: 1,
                },
            );
        assert!(strategy.to_payload().is_err());
    }
}
