//! Reorg generation commands.

use crate::context::{AppContext, CliResult};
use crate::output::render_version;

pub(crate) async fn handle_reorg_version(ctx: &AppContext) -> CliResult<String> {
    let version = ctx.store.reorg_version().await?;
    render_version(version, ctx.output)
}

pub(crate) async fn handle_reorg_bump(ctx: &AppContext) -> CliResult<String> {
    let version = ctx.store.bump_reorg_version().await?;
    render_version(version, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::context::memory_context;

    #[tokio::test]
    async fn version_starts_at_zero_and_bumps() {
        let ctx = memory_context(OutputFormat::Table);
        assert_eq!(
            handle_reorg_version(&ctx).await.expect("version"),
            "reorg version: 0"
        );
        handle_reorg_bump(&ctx).await.expect("bump");
        assert_eq!(
            handle_reorg_bump(&ctx).await.expect("bump"),
            "reorg version: 2"
        );
    }

    #[tokio::test]
    async fn corrupt_version_is_a_validation_error() {
        let ctx = memory_context(OutputFormat::Json);
        ctx.store
            .upsert(rpcgate_config::REORG_VERSION_KEY, "not-a-number")
            .await
            .expect("seed");
        let err = handle_reorg_version(&ctx).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
