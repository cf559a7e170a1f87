#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Typed gateway policy configuration over the rpcgate record store.
//!
//! Layout: `namespace.rs` (key codec + prefix registry), `fingerprint.rs` (change digests),
//! `domain.rs` (`ConfigDomain` + batch decoding), `ratelimit.rs`/`acl.rs`/`route.rs` (policy
//! domains), `reorg.rs` (generation counter), `service.rs` (`ConfigStore`).

pub mod acl;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod namespace;
pub mod ratelimit;
mod reorg;
pub mod route;
pub mod service;

pub use acl::AccessAllowList;
pub use domain::{ConfigDomain, DomainDelta, DomainSnapshot, decode_record};
pub use error::{ConfigError, ConfigResult};
pub use fingerprint::{Fingerprint, FingerprintDiff, Fingerprints, fingerprint};
pub use namespace::{
    ACL_ALLOW_LIST_PREFIX, NODE_ROUTE_GROUP_PREFIX, NamespaceRegistry,
    RATE_LIMIT_STRATEGY_PREFIX, REORG_VERSION_KEY,
};
pub use ratelimit::{
    DEFAULT_RULE_KEY, RateLimitAlgorithm, RateLimitConfig, RateLimitRule, RateLimitStrategy,
};
pub use route::NodeRouteGroup;
pub use rpcgate_data::{CancelHandle, CancelToken, ConfigRecord, ErrorKind, Interrupt, RecordId};
pub use service::ConfigStore;
