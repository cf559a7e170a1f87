//! Command-line parsing and dispatch for the rpcgate configuration store.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rpcgate_config::{CancelHandle, ConfigError, ConfigStore, Interrupt, RecordId};
use rpcgate_data::StoreSettings;
use rpcgate_data::settings::{
    ENV_ACQUIRE_TIMEOUT_SECS, ENV_DATABASE_URL, ENV_MAX_CONNECTIONS, ENV_STATEMENT_DEADLINE_MS,
};
use rpcgate_telemetry::{LogFormat, LoggingConfig, init_logging};
use tracing::debug;

use crate::commands::domains::{
    handle_list, handle_put, handle_remove, handle_route_set, handle_show, handle_show_id,
};
use crate::commands::records::{handle_delete, handle_get, handle_set};
use crate::commands::reorg::{handle_reorg_bump, handle_reorg_version};
use crate::context::{AppContext, CliResult};

#[derive(Parser)]
#[command(
    name = "rpcgate",
    about = "Administrative CLI for the rpcgate configuration store"
)]
pub(crate) struct Cli {
    #[arg(long, global = true, env = ENV_DATABASE_URL, hide_env_values = true)]
    database_url: Option<String>,
    #[arg(long, global = true, env = ENV_MAX_CONNECTIONS, help = "Pool size [default: 8]")]
    max_connections: Option<String>,
    #[arg(
        long,
        global = true,
        env = ENV_ACQUIRE_TIMEOUT_SECS,
        help = "Seconds to wait for a pooled connection [default: 10]"
    )]
    acquire_timeout_secs: Option<String>,
    #[arg(
        long,
        global = true,
        env = ENV_STATEMENT_DEADLINE_MS,
        help = "Abort any single store operation after this many milliseconds"
    )]
    statement_deadline_ms: Option<String>,
    #[arg(long, global = true, env = "RPCGATE_LOG")]
    log_level: Option<String>,
    #[arg(
        long,
        global = true,
        env = "RPCGATE_LOG_FORMAT",
        value_parser = LogFormat::from_str,
        help = "Log output format: pretty or json"
    )]
    log_format: Option<LogFormat>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print raw record values.
    Get(GetArgs),
    /// Write a raw record value.
    Set(SetArgs),
    /// Delete a raw record.
    Delete(NameArgs),
    /// List every valid object of a domain.
    List(ListArgs),
    /// Show one object of a domain by logical name.
    Show(DomainNameArgs),
    /// Show one object of a domain by record id.
    ShowId(DomainIdArgs),
    /// Validate and store an object from a JSON payload file.
    Put(PutArgs),
    /// Delete one object of a domain.
    Remove(DomainNameArgs),
    /// Store a node route group from a list of node URLs.
    RouteSet(RouteSetArgs),
    /// Inspect or advance the reorg generation.
    #[command(subcommand)]
    Reorg(ReorgCommand),
}

#[derive(Subcommand)]
pub(crate) enum ReorgCommand {
    /// Print the current reorg generation.
    Version,
    /// Advance the reorg generation by one.
    Bump,
}

#[derive(Args)]
pub(crate) struct GetArgs {
    #[arg(required = true, help = "Full record names")]
    pub(crate) names: Vec<String>,
}

#[derive(Args)]
pub(crate) struct SetArgs {
    #[arg(help = "Full record name")]
    pub(crate) name: String,
    #[arg(help = "Raw value")]
    pub(crate) value: String,
}

#[derive(Args)]
pub(crate) struct NameArgs {
    #[arg(help = "Full record name")]
    pub(crate) name: String,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    #[arg(value_enum)]
    pub(crate) domain: DomainKind,
}

#[derive(Args)]
pub(crate) struct DomainNameArgs {
    #[arg(value_enum)]
    pub(crate) domain: DomainKind,
    #[arg(help = "Logical name (without the domain prefix)")]
    pub(crate) name: String,
}

#[derive(Args)]
pub(crate) struct DomainIdArgs {
    #[arg(value_enum)]
    pub(crate) domain: DomainKind,
    #[arg(help = "Record id")]
    pub(crate) id: RecordId,
}

#[derive(Args)]
pub(crate) struct PutArgs {
    #[arg(value_enum)]
    pub(crate) domain: DomainKind,
    #[arg(help = "Logical name (without the domain prefix)")]
    pub(crate) name: String,
    #[arg(short = 'f', long = "file", help = "JSON payload file")]
    pub(crate) file: PathBuf,
}

#[derive(Args)]
pub(crate) struct RouteSetArgs {
    #[arg(help = "Route group name")]
    pub(crate) group: String,
    #[arg(help = "Node URLs in routing order")]
    pub(crate) nodes: Vec<String>,
}

/// Configuration domains addressable from the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum DomainKind {
    /// Rate-limit strategies.
    Strategy,
    /// Access-control allow-lists.
    Allowlist,
    /// Node route groups.
    Route,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Cli {
    fn setting(&self, key: &str) -> Option<String> {
        match key {
            ENV_DATABASE_URL => self.database_url.clone(),
            ENV_MAX_CONNECTIONS => self.max_connections.clone(),
            ENV_ACQUIRE_TIMEOUT_SECS => self.acquire_timeout_secs.clone(),
            ENV_STATEMENT_DEADLINE_MS => self.statement_deadline_ms.clone(),
            _ => None,
        }
    }

    fn store_settings(&self) -> CliResult<StoreSettings> {
        StoreSettings::from_lookup(|key| self.setting(key))
            .map_err(|err| ConfigError::from(err).into())
    }

    fn logging(&self) -> LoggingConfig<'_> {
        let mut logging = LoggingConfig {
            build_sha: env!("CARGO_PKG_VERSION"),
            ..LoggingConfig::default()
        };
        if let Some(level) = self.log_level.as_deref() {
            logging.level = level;
        }
        if let Some(format) = self.log_format {
            logging.format = format;
        }
        logging
    }
}

/// Parses CLI arguments, executes the requested command, and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.logging()) {
        eprintln!("warning: {err}");
    }

    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let settings = cli.store_settings()?;
    let store = ConfigStore::connect(&settings).await?;

    let cancel = CancelHandle::new();
    let store = store.with_interrupt(Interrupt::none().with_token(cancel.token()));
    let interrupt_watch = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received; cancelling in-flight operation");
            cancel.cancel();
        }
    });

    let ctx = AppContext {
        store,
        output: cli.output,
    };
    let result = dispatch(cli.command, &ctx).await;
    interrupt_watch.abort();

    println!("{}", result?);
    Ok(())
}

pub(crate) async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<String> {
    match command {
        Command::Get(args) => handle_get(ctx, &args.names).await,
        Command::Set(args) => handle_set(ctx, &args.name, &args.value).await,
        Command::Delete(args) => handle_delete(ctx, &args.name).await,
        Command::List(args) => handle_list(ctx, args.domain).await,
        Command::Show(args) => handle_show(ctx, args.domain, &args.name).await,
        Command::ShowId(args) => handle_show_id(ctx, args.domain, args.id).await,
        Command::Put(args) => handle_put(ctx, args.domain, &args.name, &args.file).await,
        Command::Remove(args) => handle_remove(ctx, args.domain, &args.name).await,
        Command::RouteSet(args) => handle_route_set(ctx, &args.group, args.nodes).await,
        Command::Reorg(ReorgCommand::Version) => handle_reorg_version(ctx).await,
        Command::Reorg(ReorgCommand::Bump) => handle_reorg_bump(ctx).await,
    }
}
