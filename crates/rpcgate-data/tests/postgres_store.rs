use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rpcgate_data::{
    CancelHandle, DataError, ErrorKind, Interrupt, MAX_VALUE_BYTES, PgRecordStore,
    RecordRepository,
};
use rpcgate_test_support::postgres::start_postgres;

async fn with_record_store<F, Fut>(label: &str, test: F) -> Result<()>
where
    F: FnOnce(PgRecordStore) -> Fut,
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
    let store = PgRecordStore::new(pool.clone())
        .await
        .context("failed to initialise record store")?;

    let result = test(store).await;

    pool.close().await;
    drop(database);
    result
}

#[tokio::test]
async fn upsert_preserves_identity_until_delete() -> Result<()> {
    with_record_store("upsert_preserves_identity_until_delete", |store| async move {
        let id = store.upsert("acl.allowlist.fluent", "{}").await?;
        let again = store
            .upsert("acl.allowlist.fluent", r#"{"enabled":true}"#)
            .await?;
        assert_eq!(id, again);

        let record = store.load_by_id(id).await?;
        assert_eq!(record.name, "acl.allowlist.fluent");
        assert_eq!(record.value, r#"{"enabled":true}"#);
        assert!(record.updated_at >= record.created_at);

        assert!(store.delete("acl.allowlist.fluent").await?);
        assert!(!store.delete("acl.allowlist.fluent").await?);
        let err = store.load_by_id(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let recreated = store.upsert("acl.allowlist.fluent", "{}").await?;
        assert_ne!(recreated, id);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn identical_upsert_is_idempotent() -> Result<()> {
    with_record_store("identical_upsert_is_idempotent", |store| async move {
        store.upsert("noderoute.group.vip", r#"{"nodes":[]}"#).await?;
        let before = store
            .load_by_name("noderoute.group.vip")
            .await?
            .context("row should exist")?;
        store.upsert("noderoute.group.vip", r#"{"nodes":[]}"#).await?;
        let after = store
            .load_by_name("noderoute.group.vip")
            .await?
            .context("row should exist")?;
        assert_eq!(before, after);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn prefix_matching_is_literal() -> Result<()> {
    with_record_store("prefix_matching_is_literal", |store| async move {
        store.upsert("ratelimit.strategy.a", "1").await?;
        store.upsert("ratelimit.strategy.b", "2").await?;
        store.upsert("ratelimit_strategy_x", "3").await?;
        store.upsert("acl.allowlist.a", "4").await?;

        let records = store.load_by_prefix("ratelimit.strategy.").await?;
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["ratelimit.strategy.a", "ratelimit.strategy.b"]);

        // `_` must not act as a single-character wildcard.
        let underscored = store.load_by_prefix("ratelimit_").await?;
        assert_eq!(underscored.len(), 1);

        let values = store
            .load_by_names(&[
                "acl.allowlist.a".to_string(),
                "acl.allowlist.missing".to_string(),
            ])
            .await?;
        assert_eq!(values.len(), 1);
        assert!(store.load_by_names(&[]).await?.is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn bounds_are_enforced() -> Result<()> {
    with_record_store("bounds_are_enforced", |store| async move {
        let oversized = "x".repeat(MAX_VALUE_BYTES + 1);
        let err = store
            .upsert("acl.allowlist.big", &oversized)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        let exact = "x".repeat(MAX_VALUE_BYTES);
        store.upsert("acl.allowlist.big", &exact).await?;

        let long_name = format!("acl.allowlist.{}", "n".repeat(128));
        let err = store.upsert(&long_name, "{}").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn concurrent_increments_do_not_lose_updates() -> Result<()> {
    with_record_store(
        "concurrent_increments_do_not_lose_updates",
        |store| async move {
            let store = Arc::new(store);
            let mut handles = Vec::new();
            for _ in 0..20 {
                let store = Arc::clone(&store);
                handles.push(tokio::spawn(
                    async move { store.increment("reorg.version").await },
                ));
            }
            for handle in handles {
                handle.await??;
            }
            let record = store
                .load_by_name("reorg.version")
                .await?
                .context("counter should exist")?;
            assert_eq!(record.value, "20");

            store.upsert("reorg.version", "garbage").await?;
            let err = store.increment("reorg.version").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);

            let ceiling = i64::MAX.to_string();
            store.upsert("reorg.version", &ceiling).await?;
            let err = store.increment("reorg.version").await.unwrap_err();
            assert!(matches!(err, DataError::CounterOverflow { .. }));
            let record = store
                .load_by_name("reorg.version")
                .await?
                .context("counter should exist")?;
            assert_eq!(record.value, ceiling);
            Ok(())
        },
    )
    .await
}

#[tokio::test]
async fn cancelled_store_refuses_work() -> Result<()> {
    with_record_store("cancelled_store_refuses_work", |store| async move {
        let handle = CancelHandle::new();
        let cancellable = store.with_interrupt(
            Interrupt::none()
                .with_token(handle.token())
                .with_deadline(Duration::from_secs(5)),
        );
        cancellable.upsert("acl.allowlist.a", "{}").await?;

        handle.cancel();
        let err = cancellable.load_by_prefix("acl.").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        // The original handle is unaffected.
        assert_eq!(store.load_by_prefix("acl.").await?.len(), 1);
        Ok(())
    })
    .await
}
