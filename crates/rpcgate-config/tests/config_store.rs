use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use rpcgate_config::{
    AccessAllowList, ConfigError, ConfigStore, ErrorKind, NodeRouteGroup, RateLimitAlgorithm,
    RateLimitRule, RateLimitStrategy,
};
use rpcgate_data::PgRecordStore;
use rpcgate_test_support::postgres::start_postgres;

async fn with_config_store<F, Fut>(label: &str, test: F) -> Result<()>
where
    F: FnOnce(ConfigStore) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let database = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping {label}: {err}");
            return Ok(());
        }
    };
    let pool = database.pool().await?;
    let repository = PgRecordStore::new(pool.clone())
        .await
        .context("failed to initialise record store")?;
    let store = ConfigStore::new(Arc::new(repository))?;

    let result = test(store).await;

    pool.close().await;
    drop(database);
    result
}

#[tokio::test]
async fn typed_domains_round_trip_through_postgres() -> Result<()> {
    with_config_store("typed_domains_round_trip_through_postgres", |store| async move {
        let strategy = RateLimitStrategy::new("public", RateLimitAlgorithm::TokenBucket)
            .with_rule(
                "default",
                RateLimitRule {
                    interval_ms: 1_000,
                    quota: 50,
                },
            );
        let strategy_id = store.store_rate_limit_strategy(&strategy).await?;
        let loaded = store.load_rate_limit_strategy("public").await?;
        assert_eq!(loaded.id, strategy_id);
        assert_eq!(loaded.rules, strategy.rules);

        let acl_id = store
            .upsert("acl.allowlist.fluent", r#"{"enabled":true}"#)
            .await?;
        let list = store.load_acl_allow_list("fluent").await?;
        assert!(list.enabled);
        assert_eq!(list.id, acl_id);

        let group = NodeRouteGroup::new(
            "archive",
            vec!["http://archive-1:8545".into(), "http://archive-2:8545".into()],
        );
        let group_id = store.store_node_route_group(&group).await?;
        assert_eq!(store.store_node_route_group(&group).await?, group_id);
        let err = store
            .load_acl_allow_list_by_id(group_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ForeignNamespace { .. }));

        assert!(store.delete_node_route_group("archive").await?);
        assert!(store.load_node_route_groups(&[]).await?.is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn bulk_loads_skip_corrupt_rows() -> Result<()> {
    with_config_store("bulk_loads_skip_corrupt_rows", |store| async move {
        store.upsert("acl.allowlist.a", r#"{"enabled":true}"#).await?;
        store.upsert("acl.allowlist.b", "definitely not json").await?;
        store.upsert("acl.allowlist.", r#"{"enabled":true}"#).await?;
        store
            .store_acl_allow_list(&AccessAllowList::new("c"))
            .await?;

        let config = store.load_rate_limit_config().await?;
        assert!(config.strategies.is_empty());
        assert_eq!(config.allow_lists.len(), 2);

        let err = store.load_acl_allow_list("b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let delta = store
            .load_changed_acl_allow_lists(&config.allow_lists.fingerprints)
            .await?;
        assert!(delta.is_unchanged());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn concurrent_reorg_bumps_are_not_lost() -> Result<()> {
    with_config_store("concurrent_reorg_bumps_are_not_lost", |store| async move {
        assert_eq!(store.reorg_version().await?, 0);

        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.bump_reorg_version().await }));
        }
        let mut observed = Vec::new();
        for handle in handles {
            observed.push(handle.await??);
        }
        observed.sort_unstable();
        assert_eq!(observed, (1..=25).collect::<Vec<i64>>());
        assert_eq!(store.reorg_version().await?, 25);
        Ok(())
    })
    .await
}
