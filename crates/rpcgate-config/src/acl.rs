//! Access-control allow-lists (`acl.allowlist.<name>`).

use rpcgate_data::RecordId;
use serde::{Deserialize, Serialize};

use crate::domain::{ConfigDomain, parse_json, render_json};
use crate::error::{ConfigError, ConfigResult};
use crate::namespace::ACL_ALLOW_LIST_PREFIX;

/// Request attributes exempted from rate limiting when the list is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessAllowList {
    /// Record id; `0` until stored.
    pub id: RecordId,
    /// Logical name.
    pub name: String,
    /// Whether the list is active.
    pub enabled: bool,
    /// Allowed `User-Agent` values.
    pub user_agents: Vec<String>,
    /// Allowed request origins.
    pub origins: Vec<String>,
    /// Allowed RPC methods.
    pub methods: Vec<String>,
    /// Allowed contract addresses.
    pub contract_addresses: Vec<String>,
}

impl AccessAllowList {
    /// Empty, disabled list.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AllowListPayload {
    #[serde(default)]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    user_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    origins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    contract_addresses: Vec<String>,
}

impl AllowListPayload {
    fn validate(&self, name: &str) -> ConfigResult<()> {
        for (field, entries) in [
            ("user_agents", &self.user_agents),
            ("origins", &self.origins),
            ("methods", &self.methods),
            ("contract_addresses", &self.contract_addresses),
        ] {
            if let Some(index) = entries.iter().position(|entry| entry.trim().is_empty()) {
                return Err(ConfigError::invalid(
                    AccessAllowList::KIND,
                    name,
                    format!("{field}[{index}] is empty"),
                ));
            }
        }
        Ok(())
    }
}

impl ConfigDomain for AccessAllowList {
    const PREFIX: &'static str = ACL_ALLOW_LIST_PREFIX;
    const KIND: &'static str = "allow-list";

    fn from_payload(id: RecordId, name: &str, value: &str) -> ConfigResult<Self> {
        let payload: AllowListPayload = parse_json(Self::KIND, name, value)?;
        payload.validate(name)?;
        Ok(Self {
            id,
            name: name.to_string(),
            enabled: payload.enabled,
            user_agents: payload.user_agents,
            origins: payload.origins,
            methods: payload.methods,
            contract_addresses: payload.contract_addresses,
        })
    }

    fn to_payload(&self) -> ConfigResult<String> {
        let payload = AllowListPayload {
            enabled: self.enabled,
            user_agents: self.user_agents.clone(),
            origins: self.origins.clone(),
            methods: self.methods.clone(),
            contract_addresses: self.contract_addresses.clone(),
        };
        payload.validate(&self.name)?;
        render_json(Self::KIND, &self.name, &payload)
    }

    fn logical_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> RecordId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_payload_enables_list() {
        let list =
            AccessAllowList::from_payload(12, "fluent", r#"{"enabled":true}"#).expect("valid");
        assert_eq!(list.id, 12);
        assert_eq!(list.name, "fluent");
        assert!(list.enabled);
        assert!(list.methods.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let list = AccessAllowList::from_payload(
            1,
            "partners",
            r#"{"origins":["https://app.example"],"comment":"q3"}"#,
        )
        .expect("valid");
        assert!(!list.enabled);
        assert_eq!(list.origins, ["https://app.example"]);
    }

    #[test]
    fn blank_entries_are_rejected() {
        let err = AccessAllowList::from_payload(1, "x", r#"{"methods":["eth_call",""]}"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid allow-list 'x': methods[1] is empty"
        );
    }

    #[test]
    fn encoding_omits_empty_lists() {
        let mut list = AccessAllowList::new("fluent");
        list.enabled = true;
        assert_eq!(list.to_payload().expect("payload"), r#"{"enabled":true}"#);
    }
}
