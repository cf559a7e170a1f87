//! `ConfigStore`: typed, namespaced access to the record repository.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use rpcgate_data::{
    ConfigRecord, Interrupt, PgRecordStore, RecordId, RecordLookup, RecordRepository,
    StoreSettings,
};
use tracing::{debug, info, instrument};

use crate::acl::AccessAllowList;
use crate::domain::{ConfigDomain, DomainDelta, DomainSnapshot, decode_record};
use crate::error::{ConfigError, ConfigResult};
use crate::fingerprint::Fingerprints;
use crate::namespace::{self, NamespaceRegistry};
use crate::ratelimit::{RateLimitConfig, RateLimitStrategy};
use crate::reorg;
use crate::route::NodeRouteGroup;

/// Facade over a [`RecordRepository`] that speaks in typed configuration domains.
///
/// Holds no configuration in memory; every call reads or writes through to the repository.
#[derive(Clone)]
pub struct ConfigStore {
    repository: Arc<dyn RecordRepository>,
    registry: Arc<NamespaceRegistry>,
    interrupt: Interrupt,
}

impl ConfigStore {
    /// Wrap `repository` with the built-in namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in namespaces overlap.
    pub fn new(repository: Arc<dyn RecordRepository>) -> ConfigResult<Self> {
        Ok(Self::with_registry(repository, NamespaceRegistry::builtin()?))
    }

    /// Wrap `repository` with a caller-assembled namespace registry.
    #[must_use]
    pub fn with_registry(repository: Arc<dyn RecordRepository>, registry: NamespaceRegistry) -> Self {
        Self {
            repository,
            registry: Arc::new(registry),
            interrupt: Interrupt::none(),
        }
    }

    /// Connect to `PostgreSQL`, apply migrations, and wrap the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migrations fail.
    #[instrument(name = "config_store.connect", skip(settings))]
    pub async fn connect(settings: &StoreSettings) -> ConfigResult<Self> {
        let repository = PgRecordStore::connect(settings).await?;
        info!("configuration store ready");
        Self::new(Arc::new(repository))
    }

    /// Return a copy of the store that applies `interrupt` to every operation.
    #[must_use]
    pub fn with_interrupt(&self, interrupt: Interrupt) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            registry: Arc::clone(&self.registry),
            interrupt,
        }
    }

    /// Registered namespaces.
    #[must_use]
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    async fn guard<T, F>(&self, operation: &'static str, future: F) -> ConfigResult<T>
    where
        T: Send,
        F: Future<Output = ConfigResult<T>> + Send,
    {
        self.interrupt.run(operation, future).await
    }

    fn domain_key<D: ConfigDomain>(&self, name: &str) -> ConfigResult<String> {
        self.registry.require(D::PREFIX)?;
        let key = namespace::encode(D::PREFIX, name);
        namespace::decode(D::PREFIX, &key)?;
        Ok(key)
    }

    // Raw records.

    /// Values of the named records; missing names are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the call is interrupted.
    pub async fn load_by_names(&self, names: &[String]) -> ConfigResult<BTreeMap<String, String>> {
        self.guard("load configs by name", async {
            Ok(self.repository.load_by_names(names).await?)
        })
        .await
    }

    /// Records whose name starts with `prefix`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the call is interrupted.
    pub async fn load_by_pattern(&self, prefix: &str) -> ConfigResult<Vec<ConfigRecord>> {
        self.guard("load configs by prefix", async {
            Ok(self.repository.load_by_prefix(prefix).await?)
        })
        .await
    }

    /// Record with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the id is absent.
    pub async fn load_record_by_id(&self, id: RecordId) -> ConfigResult<ConfigRecord> {
        self.guard("load config by id", async {
            Ok(self.repository.load_by_id(id).await?)
        })
        .await
    }

    /// Insert or replace a raw record, returning its id.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the name or value exceeds its bound.
    #[instrument(name = "config_store.upsert", skip(self, value), fields(value_len = value.len()))]
    pub async fn upsert(&self, name: &str, value: &str) -> ConfigResult<RecordId> {
        self.guard("upsert config", async {
            Ok(self.repository.upsert(name, value).await?)
        })
        .await
    }

    /// Delete a raw record, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails or the call is interrupted.
    #[instrument(name = "config_store.delete", skip(self))]
    pub async fn delete(&self, name: &str) -> ConfigResult<bool> {
        self.guard("delete config", async {
            Ok(self.repository.delete(name).await?)
        })
        .await
    }

    // Typed domains.

    /// Load one object of domain `D` by logical name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when absent and a validation error when the logical
    /// name is empty or the payload is invalid.
    #[instrument(name = "config_store.load", skip(self), fields(domain = D::KIND))]
    pub async fn load<D: ConfigDomain>(&self, name: &str) -> ConfigResult<D> {
        let key = self.domain_key::<D>(name)?;
        self.guard("load config object", async {
            let record = self
                .repository
                .load_by_name(&key)
                .await?
                .ok_or_else(|| ConfigError::NotFound {
                    lookup: RecordLookup::Name(key.clone()).to_string(),
                })?;
            decode_record(&record)
        })
        .await
    }

    /// Load one object of domain `D` by record id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when absent and a validation error when the record
    /// belongs to another domain or its payload is invalid.
    #[instrument(name = "config_store.load_by_id", skip(self), fields(domain = D::KIND))]
    pub async fn load_by_id<D: ConfigDomain>(&self, id: RecordId) -> ConfigResult<D> {
        self.registry.require(D::PREFIX)?;
        self.guard("load config object by id", async {
            let record = self.repository.load_by_id(id).await?;
            decode_record(&record)
        })
        .await
    }

    async fn fetch_snapshot<D: ConfigDomain>(&self) -> ConfigResult<DomainSnapshot<D>> {
        self.registry.require(D::PREFIX)?;
        let records = self.repository.load_by_prefix(D::PREFIX).await?;
        let total = records.len();
        let snapshot = DomainSnapshot::decode(records);
        debug!(
            domain = D::KIND,
            loaded = snapshot.len(),
            skipped = total - snapshot.len(),
            "loaded config domain"
        );
        Ok(snapshot)
    }

    /// Load every valid object of domain `D` with its fingerprint. Invalid rows are logged
    /// and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the repository fails or the call is interrupted.
    #[instrument(name = "config_store.load_all", skip(self), fields(domain = D::KIND))]
    pub async fn load_all<D: ConfigDomain>(&self) -> ConfigResult<DomainSnapshot<D>> {
        self.guard("load config domain", self.fetch_snapshot())
            .await
    }

    /// Decode only the objects of domain `D` whose fingerprint differs from `previous`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the repository fails or the call is interrupted.
    #[instrument(
        name = "config_store.load_changed",
        skip(self, previous),
        fields(domain = D::KIND, known = previous.len())
    )]
    pub async fn load_changed<D: ConfigDomain>(
        &self,
        previous: &Fingerprints,
    ) -> ConfigResult<DomainDelta<D>> {
        self.registry.require(D::PREFIX)?;
        self.guard("load changed config objects", async {
            let records = self.repository.load_by_prefix(D::PREFIX).await?;
            let delta = DomainDelta::decode(records, previous);
            debug!(
                domain = D::KIND,
                changed = delta.changed.len(),
                removed = delta.removed.len(),
                "polled config domain"
            );
            Ok(delta)
        })
        .await
    }

    /// Validate and store `object` under its logical name, returning the record id.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the logical name is empty or the object is invalid,
    /// and a storage error when the encoded payload exceeds its bound.
    #[instrument(
        name = "config_store.store",
        skip(self, object),
        fields(domain = D::KIND, name = object.logical_name())
    )]
    pub async fn store<D: ConfigDomain>(&self, object: &D) -> ConfigResult<RecordId> {
        let key = self.domain_key::<D>(object.logical_name())?;
        let payload = object.to_payload()?;
        self.guard("store config object", async {
            let id = self.repository.upsert(&key, &payload).await?;
            debug!(record_id = id, "stored config object");
            Ok(id)
        })
        .await
    }

    /// Delete the object of domain `D` named `name`, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `name` is empty.
    #[instrument(name = "config_store.remove", skip(self), fields(domain = D::KIND))]
    pub async fn remove<D: ConfigDomain>(&self, name: &str) -> ConfigResult<bool> {
        let key = self.domain_key::<D>(name)?;
        self.guard("remove config object", async {
            Ok(self.repository.delete(&key).await?)
        })
        .await
    }

    // Rate-limit strategies.

    /// Load a rate-limit strategy by logical name.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load`].
    pub async fn load_rate_limit_strategy(&self, name: &str) -> ConfigResult<RateLimitStrategy> {
        self.load(name).await
    }

    /// Load a rate-limit strategy by record id.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_by_id`].
    pub async fn load_rate_limit_strategy_by_id(
        &self,
        id: RecordId,
    ) -> ConfigResult<RateLimitStrategy> {
        self.load_by_id(id).await
    }

    /// Load every valid rate-limit strategy.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_all`].
    pub async fn load_rate_limit_strategies(
        &self,
    ) -> ConfigResult<DomainSnapshot<RateLimitStrategy>> {
        self.load_all().await
    }

    /// Load rate-limit strategies changed since `previous`.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_changed`].
    pub async fn load_changed_rate_limit_strategies(
        &self,
        previous: &Fingerprints,
    ) -> ConfigResult<DomainDelta<RateLimitStrategy>> {
        self.load_changed(previous).await
    }

    /// Store a rate-limit strategy.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::store`].
    pub async fn store_rate_limit_strategy(
        &self,
        strategy: &RateLimitStrategy,
    ) -> ConfigResult<RecordId> {
        self.store(strategy).await
    }

    /// Delete a rate-limit strategy.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::remove`].
    pub async fn delete_rate_limit_strategy(&self, name: &str) -> ConfigResult<bool> {
        self.remove::<RateLimitStrategy>(name).await
    }

    // Allow-lists.

    /// Load an allow-list by logical name.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load`].
    pub async fn load_acl_allow_list(&self, name: &str) -> ConfigResult<AccessAllowList> {
        self.load(name).await
    }

    /// Load an allow-list by record id.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_by_id`].
    pub async fn load_acl_allow_list_by_id(&self, id: RecordId) -> ConfigResult<AccessAllowList> {
        self.load_by_id(id).await
    }

    /// Load every valid allow-list.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_all`].
    pub async fn load_acl_allow_lists(&self) -> ConfigResult<DomainSnapshot<AccessAllowList>> {
        self.load_all().await
    }

    /// Load allow-lists changed since `previous`.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_changed`].
    pub async fn load_changed_acl_allow_lists(
        &self,
        previous: &Fingerprints,
    ) -> ConfigResult<DomainDelta<AccessAllowList>> {
        self.load_changed(previous).await
    }

    /// Store an allow-list.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::store`].
    pub async fn store_acl_allow_list(&self, list: &AccessAllowList) -> ConfigResult<RecordId> {
        self.store(list).await
    }

    /// Delete an allow-list.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::remove`].
    pub async fn delete_acl_allow_list(&self, name: &str) -> ConfigResult<bool> {
        self.remove::<AccessAllowList>(name).await
    }

    /// Strategies and allow-lists in one call, as polled by the rate limiter.
    ///
    /// # Errors
    ///
    /// Returns an error only when the repository fails or the call is interrupted.
    #[instrument(name = "config_store.load_rate_limit_config", skip(self))]
    pub async fn load_rate_limit_config(&self) -> ConfigResult<RateLimitConfig> {
        self.guard("load rate limit config", async {
            Ok(RateLimitConfig {
                strategies: self.fetch_snapshot().await?,
                allow_lists: self.fetch_snapshot().await?,
            })
        })
        .await
    }

    // Node route groups.

    /// Load a node route group by logical name.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load`].
    pub async fn load_node_route_group(&self, name: &str) -> ConfigResult<NodeRouteGroup> {
        self.load(name).await
    }

    /// Load a node route group by record id.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_by_id`].
    pub async fn load_node_route_group_by_id(&self, id: RecordId) -> ConfigResult<NodeRouteGroup> {
        self.load_by_id(id).await
    }

    /// Load every valid node route group with fingerprints.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_all`].
    pub async fn load_all_node_route_groups(
        &self,
    ) -> ConfigResult<DomainSnapshot<NodeRouteGroup>> {
        self.load_all().await
    }

    /// Load node route groups changed since `previous`.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::load_changed`].
    pub async fn load_changed_node_route_groups(
        &self,
        previous: &Fingerprints,
    ) -> ConfigResult<DomainDelta<NodeRouteGroup>> {
        self.load_changed(previous).await
    }

    /// Valid node route groups keyed by logical name. An empty `inclusive` list loads every
    /// group; otherwise only the listed groups that exist and decode are returned.
    ///
    /// # Errors
    ///
    /// Returns an error only when the repository fails or the call is interrupted.
    #[instrument(
        name = "config_store.load_node_route_groups",
        skip(self, inclusive),
        fields(requested = inclusive.len())
    )]
    pub async fn load_node_route_groups(
        &self,
        inclusive: &[String],
    ) -> ConfigResult<BTreeMap<String, NodeRouteGroup>> {
        self.registry.require(NodeRouteGroup::PREFIX)?;
        self.guard("load node route groups", async {
            let records = if inclusive.is_empty() {
                self.repository
                    .load_by_prefix(NodeRouteGroup::PREFIX)
                    .await?
            } else {
                let names: Vec<String> = inclusive
                    .iter()
                    .map(|group| namespace::encode(NodeRouteGroup::PREFIX, group))
                    .collect();
                self.repository.load_records(&names).await?
            };
            Ok(DomainSnapshot::<NodeRouteGroup>::decode(records)
                .items
                .into_values()
                .map(|group| (group.name.clone(), group))
                .collect())
        })
        .await
    }

    /// Store a node route group.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::store`].
    pub async fn store_node_route_group(&self, group: &NodeRouteGroup) -> ConfigResult<RecordId> {
        self.store(group).await
    }

    /// Delete a node route group.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::remove`].
    pub async fn delete_node_route_group(&self, name: &str) -> ConfigResult<bool> {
        self.remove::<NodeRouteGroup>(name).await
    }

    // Reorg generation.

    /// Current reorg generation; zero when never bumped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonNumericVersion`] when the stored value is not an integer and
    /// [`ConfigError::Storage`] when it does not fit an `i64`.
    pub async fn reorg_version(&self) -> ConfigResult<i64> {
        self.guard("read reorg version", reorg::read_version(self.repository.as_ref()))
            .await
    }

    /// Atomically advance the reorg generation and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonNumericVersion`] when the stored value is not an integer and
    /// [`ConfigError::Storage`] when it is, or would advance past, `i64::MAX`.
    #[instrument(name = "config_store.bump_reorg_version", skip(self))]
    pub async fn bump_reorg_version(&self) -> ConfigResult<i64> {
        let version = self
            .guard("bump reorg version", reorg::bump_version(self.repository.as_ref()))
            .await?;
        info!(version, "reorg version bumped");
        Ok(version)
    }
}
