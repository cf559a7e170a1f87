//! Typed domain commands: `list`, `show`, `show-id`, `put`, `remove`, `route-set`.

use std::path::Path;

use anyhow::Context;
use rpcgate_config::{
    AccessAllowList, ConfigDomain, NodeRouteGroup, RateLimitStrategy, RecordId,
};

use crate::cli::DomainKind;
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{Summary, render_object, render_snapshot};

pub(crate) async fn handle_list(ctx: &AppContext, domain: DomainKind) -> CliResult<String> {
    match domain {
        DomainKind::Strategy => list::<RateLimitStrategy>(ctx).await,
        DomainKind::Allowlist => list::<AccessAllowList>(ctx).await,
        DomainKind::Route => list::<NodeRouteGroup>(ctx).await,
    }
}

pub(crate) async fn handle_show(
    ctx: &AppContext,
    domain: DomainKind,
    name: &str,
) -> CliResult<String> {
    match domain {
        DomainKind::Strategy => show::<RateLimitStrategy>(ctx, name).await,
        DomainKind::Allowlist => show::<AccessAllowList>(ctx, name).await,
        DomainKind::Route => show::<NodeRouteGroup>(ctx, name).await,
    }
}

pub(crate) async fn handle_show_id(
    ctx: &AppContext,
    domain: DomainKind,
    id: RecordId,
) -> CliResult<String> {
    match domain {
        DomainKind::Strategy => show_id::<RateLimitStrategy>(ctx, id).await,
        DomainKind::Allowlist => show_id::<AccessAllowList>(ctx, id).await,
        DomainKind::Route => show_id::<NodeRouteGroup>(ctx, id).await,
    }
}

pub(crate) async fn handle_put(
    ctx: &AppContext,
    domain: DomainKind,
    name: &str,
    file: &Path,
) -> CliResult<String> {
    let payload = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))
        .map_err(CliError::failure)?;
    match domain {
        DomainKind::Strategy => put::<RateLimitStrategy>(ctx, name, &payload).await,
        DomainKind::Allowlist => put::<AccessAllowList>(ctx, name, &payload).await,
        DomainKind::Route => put::<NodeRouteGroup>(ctx, name, &payload).await,
    }
}

pub(crate) async fn handle_remove(
    ctx: &AppContext,
    domain: DomainKind,
    name: &str,
) -> CliResult<String> {
    let existed = match domain {
        DomainKind::Strategy => ctx.store.delete_rate_limit_strategy(name).await?,
        DomainKind::Allowlist => ctx.store.delete_acl_allow_list(name).await?,
        DomainKind::Route => ctx.store.delete_node_route_group(name).await?,
    };
    if existed {
        Ok(format!("removed {name}"))
    } else {
        Err(CliError::not_found(format!("'{name}' not found")))
    }
}

pub(crate) async fn handle_route_set(
    ctx: &AppContext,
    group: &str,
    nodes: Vec<String>,
) -> CliResult<String> {
    let group = NodeRouteGroup::new(group, nodes);
    let id = ctx.store.store_node_route_group(&group).await?;
    Ok(format!(
        "stored {} '{}' with {} node(s) (id {id})",
        NodeRouteGroup::KIND,
        group.name,
        group.nodes.len()
    ))
}

async fn list<D: Summary>(ctx: &AppContext) -> CliResult<String> {
    let snapshot = ctx.store.load_all::<D>().await?;
    render_snapshot(&snapshot, ctx.output)
}

async fn show<D: Summary>(ctx: &AppContext, name: &str) -> CliResult<String> {
    let object = ctx.store.load::<D>(name).await?;
    render_object(&object, ctx.output)
}

async fn show_id<D: Summary>(ctx: &AppContext, id: RecordId) -> CliResult<String> {
    let object = ctx.store.load_by_id::<D>(id).await?;
    render_object(&object, ctx.output)
}

async fn put<D: Summary>(ctx: &AppContext, name: &str, payload: &str) -> CliResult<String> {
    let object = D::from_payload(0, name, payload)?;
    let id = ctx.store.store(&object).await?;
    Ok(format!("stored {} '{name}' (id {id})", D::KIND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::cli::OutputFormat;
    use crate::context::memory_context;

    fn payload_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write payload");
        file
    }

    #[tokio::test]
    async fn put_validates_before_storing() {
        let ctx = memory_context(OutputFormat::Table);
        let good = payload_file(r#"{"enabled":true,"methods":["eth_call"]}"#);
        let output = handle_put(&ctx, DomainKind::Allowlist, "fluent", good.path())
            .await
            .expect("put");
        assert_eq!(output, "stored allow-list 'fluent' (id 1)");

        let bad = payload_file(r#"{"rules":{"default":{"interval_ms":0,"quota":1}}}"#);
        let err = handle_put(&ctx, DomainKind::Strategy, "public", bad.path())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = handle_show(&ctx, DomainKind::Strategy, "public")
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn list_and_show_render_domains() {
        let ctx = memory_context(OutputFormat::Table);
        handle_route_set(
            &ctx,
            "archive",
            vec!["http://a:8545".into(), "http://b:8545".into()],
        )
        .await
        .expect("route-set");

        let listing = handle_list(&ctx, DomainKind::Route).await.expect("list");
        let mut lines = listing.lines();
        assert!(lines.next().is_some_and(|header| header.starts_with("ID")));
        let row = lines.next().expect("one row");
        assert!(row.contains("archive"));
        assert!(row.ends_with("http://a:8545, http://b:8545"));

        let shown = handle_show_id(&ctx, DomainKind::Route, 1)
            .await
            .expect("show-id");
        assert!(shown.contains("name: archive"));

        let err = handle_show_id(&ctx, DomainKind::Allowlist, 1)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        assert_eq!(
            handle_remove(&ctx, DomainKind::Route, "archive")
                .await
                .expect("remove"),
            "removed archive"
        );
        assert!(
            handle_list(&ctx, DomainKind::Route)
                .await
                .expect("list")
                .lines()
                .nth(1)
                .is_none()
        );
    }

    #[tokio::test]
    async fn route_set_rejects_relative_nodes() {
        let ctx = memory_context(OutputFormat::Table);
        let err = handle_route_set(&ctx, "vip", vec!["vip-node".into()])
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
