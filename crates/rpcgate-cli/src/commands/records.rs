//! Raw record commands: `get`, `set`, `delete`.

use crate::context::{AppContext, CliError, CliResult};
use crate::output::render_values;

pub(crate) async fn handle_get(ctx: &AppContext, names: &[String]) -> CliResult<String> {
    let values = ctx.store.load_by_names(names).await?;
    if values.is_empty() {
        return Err(CliError::not_found(format!(
            "no records found for {}",
            names.join(", ")
        )));
    }
    for missing in names.iter().filter(|name| !values.contains_key(*name)) {
        eprintln!("warning: record '{missing}' not found");
    }
    render_values(&values, ctx.output)
}

pub(crate) async fn handle_set(ctx: &AppContext, name: &str, value: &str) -> CliResult<String> {
    let id = ctx.store.upsert(name, value).await?;
    Ok(format!("stored {name} (id {id})"))
}

pub(crate) async fn handle_delete(ctx: &AppContext, name: &str) -> CliResult<String> {
    if ctx.store.delete(name).await? {
        Ok(format!("deleted {name}"))
    } else {
        Err(CliError::not_found(format!("record '{name}' not found")))
    }
}
