//! Output renderers and formatting helpers for CLI commands.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::anyhow;
use rpcgate_config::{
    AccessAllowList, ConfigDomain, DomainSnapshot, Fingerprint, NodeRouteGroup, RateLimitStrategy,
    RecordId, fingerprint,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

const SHORT_FINGERPRINT_LEN: usize = 12;

/// One-line description of a domain object for table output.
pub(crate) trait Summary: ConfigDomain {
    fn summary(&self) -> String;
}

impl Summary for RateLimitStrategy {
    fn summary(&self) -> String {
        let rules = self
            .rules
            .iter()
            .map(|(method, rule)| format!("{method}={}/{}ms", rule.quota, rule.interval_ms))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{:?} {rules}", self.algorithm)
    }
}

impl Summary for AccessAllowList {
    fn summary(&self) -> String {
        format!(
            "{} ua={} origins={} methods={} contracts={}",
            if self.enabled { "enabled" } else { "disabled" },
            self.user_agents.len(),
            self.origins.len(),
            self.methods.len(),
            self.contract_addresses.len()
        )
    }
}

impl Summary for NodeRouteGroup {
    fn summary(&self) -> String {
        if self.nodes.is_empty() {
            "<no nodes>".to_string()
        } else {
            self.nodes.join(", ")
        }
    }
}

#[derive(Serialize)]
struct ObjectView<'a> {
    id: RecordId,
    name: &'a str,
    fingerprint: Fingerprint,
    payload: Value,
}

fn object_view<D: ConfigDomain>(object: &D) -> CliResult<ObjectView<'_>> {
    let payload = object.to_payload()?;
    let value = serde_json::from_str(&payload)
        .map_err(|err| CliError::failure(anyhow!("payload is not valid JSON: {err}")))?;
    Ok(ObjectView {
        id: object.id(),
        name: object.logical_name(),
        fingerprint: fingerprint(&payload),
        payload: value,
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

fn short(digest: &Fingerprint) -> String {
    let mut hex = digest.to_hex();
    hex.truncate(SHORT_FINGERPRINT_LEN);
    hex
}

pub(crate) fn render_values(
    values: &BTreeMap<String, String>,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(values),
        OutputFormat::Table => Ok(values
            .iter()
            .map(|(name, value)| format!("{name} = {value}"))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

pub(crate) fn render_snapshot<D: Summary>(
    snapshot: &DomainSnapshot<D>,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => {
            let views = snapshot
                .items
                .values()
                .map(object_view)
                .collect::<CliResult<Vec<_>>>()?;
            to_json(&views)
        }
        OutputFormat::Table => {
            let mut text = format!("{:<8} {:<24} {:<12} SUMMARY", "ID", "NAME", "FINGERPRINT");
            for (id, item) in &snapshot.items {
                let digest = snapshot
                    .fingerprints
                    .get(id)
                    .map_or_else(|| "-".to_string(), short);
                let _ = write!(
                    text,
                    "\n{:<8} {:<24} {:<12} {}",
                    id,
                    item.logical_name(),
                    digest,
                    item.summary()
                );
            }
            Ok(text)
        }
    }
}

pub(crate) fn render_object<D: Summary>(object: &D, format: OutputFormat) -> CliResult<String> {
    let view = object_view(object)?;
    match format {
        OutputFormat::Json => to_json(&view),
        OutputFormat::Table => Ok(format!(
            "kind: {}\nid: {}\nname: {}\nfingerprint: {}\nsummary: {}\npayload: {}",
            D::KIND,
            view.id,
            view.name,
            view.fingerprint,
            object.summary(),
            view.payload
        )),
    }
}

pub(crate) fn render_version(version: i64, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "reorg_version": version })),
        OutputFormat::Table => Ok(format!("reorg version: {version}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcgate_config::{RateLimitAlgorithm, RateLimitRule};

    #[test]
    fn values_render_one_per_line() {
        let values: BTreeMap<String, String> = [
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]
        .into();
        assert_eq!(
            render_values(&values, OutputFormat::Table).expect("table"),
            "a = 1\nb = 2"
        );
        let json: Value =
            serde_json::from_str(&render_values(&values, OutputFormat::Json).expect("json"))
                .expect("valid json");
        assert_eq!(json["b"], "2");
    }

    #[test]
    fn object_json_embeds_payload() {
        let mut group = NodeRouteGroup::new("vip", vec!["http://vip:8545".into()]);
        group.id = 7;
        let text = render_object(&group, OutputFormat::Json).expect("json");
        let json: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(json["id"], 7);
        assert_eq!(json["payload"]["nodes"][0], "http://vip:8545");
        assert_eq!(
            json["fingerprint"],
            fingerprint(r#"{"nodes":["http://vip:8545"]}"#).to_hex()
        );
    }

    #[test]
    fn summaries_describe_each_domain() {
        let strategy = RateLimitStrategy::new("public", RateLimitAlgorithm::TokenBucket)
            .with_rule(
                "default",
                RateLimitRule {
                    interval_ms: 1000,
                    quota: 20,
                },
            );
        assert_eq!(strategy.summary(), "TokenBucket default=20/1000ms");

        let mut list = AccessAllowList::new("fluent");
        list.enabled = true;
        list.methods.push("eth_call".into());
        assert_eq!(
            list.summary(),
            "enabled ua=0 origins=0 methods=1 contracts=0"
        );

        assert_eq!(NodeRouteGroup::new("x", Vec::new()).summary(), "<no nodes>");
    }

    #[test]
    fn version_renders_in_both_formats() {
        assert_eq!(
            render_version(3, OutputFormat::Table).expect("table"),
            "reorg version: 3"
        );
        let json: Value =
            serde_json::from_str(&render_version(3, OutputFormat::Json).expect("json"))
                .expect("valid json");
        assert_eq!(json["reorg_version"], 3);
    }
}
