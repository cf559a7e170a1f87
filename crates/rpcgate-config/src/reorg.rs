//! Chain reorganization generation counter stored under [`REORG_VERSION_KEY`].

use rpcgate_data::{RecordRepository, parse_counter};

use crate::error::{ConfigError, ConfigResult};
use crate::namespace::REORG_VERSION_KEY;

/// Parse a stored version; an absent row is generation zero.
///
/// Text that is not an integer is a validation error. Digits outside the `i64` range are a
/// storage error, the same outcome [`bump_version`] reports for that row.
pub(crate) fn parse_version(value: Option<&str>) -> ConfigResult<i64> {
    value.map_or(Ok(0), |raw| {
        parse_counter(REORG_VERSION_KEY, raw).map_err(ConfigError::from)
    })
}

/// Current generation.
pub(crate) async fn read_version(repository: &dyn RecordRepository) -> ConfigResult<i64> {
    let record = repository.load_by_name(REORG_VERSION_KEY).await?;
    parse_version(record.as_ref().map(|record| record.value.as_str()))
}

/// Advance the generation in one storage round trip and return the new value.
pub(crate) async fn bump_version(repository: &dyn RecordRepository) -> ConfigResult<i64> {
    Ok(repository.increment(REORG_VERSION_KEY).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcgate_data::{ErrorKind, MemoryRecordStore};

    #[test]
    fn parse_accepts_padded_integers() {
        assert_eq!(parse_version(None).expect("absent"), 0);
        assert_eq!(parse_version(Some(" 42\n")).expect("padded"), 42);
        let err = parse_version(Some("forty-two")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn out_of_range_versions_fail_alike_on_read_and_bump() {
        let store = MemoryRecordStore::new();
        let ceiling = i64::MAX.to_string();
        for stored in ["99999999999999999999", ceiling.as_str()] {
            store
                .upsert(REORG_VERSION_KEY, stored)
                .await
                .expect("seed large value");
            let bumped = bump_version(&store).await.unwrap_err();
            assert_eq!(bumped.kind(), ErrorKind::Storage);
        }

        store
            .upsert(REORG_VERSION_KEY, "99999999999999999999")
            .await
            .expect("seed out-of-range value");
        let read = read_version(&store).await.unwrap_err();
        let bumped = bump_version(&store).await.unwrap_err();
        assert_eq!(read.kind(), ErrorKind::Storage);
        assert_eq!(read.kind(), bumped.kind());
    }

    #[tokio::test]
    async fn bump_starts_from_one() {
        let store = MemoryRecordStore::new();
        assert_eq!(read_version(&store).await.expect("read"), 0);
        assert_eq!(bump_version(&store).await.expect("bump"), 1);
        assert_eq!(bump_version(&store).await.expect("bump"), 2);
        assert_eq!(read_version(&store).await.expect("read"), 2);
    }

    #[tokio::test]
    async fn corrupt_counter_is_surfaced() {
        let store = MemoryRecordStore::new();
        store
            .upsert(REORG_VERSION_KEY, "x")
            .await
            .expect("seed corrupt value");
        let err = read_version(&store).await.unwrap_err();
        assert!(matches!(err, ConfigError::NonNumericVersion { .. }));
        let err = bump_version(&store).await.unwrap_err();
        assert!(matches!(err, ConfigError::NonNumericVersion { .. }));
    }
}
