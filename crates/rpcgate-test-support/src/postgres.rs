//! Disposable PostgreSQL databases for integration tests.
//!
//! `RPCGATE_TEST_DATABASE_URL` points the suites at an existing server, where each test gets
//! a freshly created database. Without it a throwaway cluster is started from the local
//! `initdb`/`postgres`/`pg_isready` binaries. Suites skip when neither is available.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use postgres::NoTls;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use url::Url;

/// Environment variable naming an existing server to create test databases on.
pub const TEST_DATABASE_URL_ENV: &str = "RPCGATE_TEST_DATABASE_URL";

const POOL_CONNECT_ATTEMPTS: u32 = 10;
const READY_ATTEMPTS: u32 = 30;

/// A database that is dropped (and its cluster stopped, if spawned) when the handle drops.
pub struct TestDatabase {
    connection_string: String,
    admin_url: String,
    database: String,
    cluster: Option<LocalCluster>,
}

struct LocalCluster {
    process: Child,
    data_dir: PathBuf,
}

impl TestDatabase {
    /// Connection string for the test database.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Open an `sqlx` pool on the test database, retrying while the server warms up.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once every attempt has failed.
    pub async fn pool(&self) -> Result<PgPool> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .connect(&self.connection_string)
                .await
            {
                Ok(pool) => return Ok(pool),
                Err(err) => {
                    attempt += 1;
                    if attempt >= POOL_CONNECT_ATTEMPTS {
                        return Err(err).context("failed to connect to test database");
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let _ = run_admin(
            &self.admin_url,
            format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.database),
        );
        if let Some(cluster) = &mut self.cluster {
            let _ = cluster.process.kill();
            let _ = cluster.process.wait();
            let _ = fs::remove_dir_all(&cluster.data_dir);
        }
    }
}

/// Provision a fresh database.
///
/// # Errors
///
/// Returns an error when no external server is configured and local binaries are missing or
/// fail to start. Callers treat this as a reason to skip.
pub fn start_postgres() -> Result<TestDatabase> {
    if let Ok(url) = std::env::var(TEST_DATABASE_URL_ENV) {
        return create_database_on(&url, None);
    }

    let cluster_port = reserve_port()?;
    let cluster = spawn_cluster(cluster_port)?;
    let base_url = format!("postgres://postgres@127.0.0.1:{cluster_port}/postgres");
    create_database_on(&base_url, Some(cluster))
}

fn create_database_on(base_url: &str, cluster: Option<LocalCluster>) -> Result<TestDatabase> {
    let parsed = Url::parse(base_url).context("invalid postgres connection url")?;
    let database = unique_database_name();

    let mut admin = parsed.clone();
    admin.set_path("/postgres");
    let mut target = parsed;
    target.set_path(&format!("/{database}"));

    run_admin(admin.as_str(), format!("CREATE DATABASE \"{database}\""))?;

    Ok(TestDatabase {
        connection_string: target.to_string(),
        admin_url: admin.to_string(),
        database,
        cluster,
    })
}

fn spawn_cluster(port: u16) -> Result<LocalCluster> {
    let initdb = resolve_binary("initdb")?;
    let server = resolve_binary("postgres")?;
    let pg_isready = resolve_binary("pg_isready")?;

    let data_dir = create_data_dir()?;
    let data_dir_arg = data_dir
        .to_str()
        .context("data dir contains non-utf8 characters")?
        .to_string();

    let status = Command::new(&initdb)
        .args(["-D", &data_dir_arg, "--username=postgres", "--auth=trust"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to run initdb")?;
    if !status.success() {
        bail!("initdb exited with failure status");
    }

    let process = Command::new(&server)
        .args(["-D", &data_dir_arg, "-p", &port.to_string(), "-h", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start postgres process")?;

    let mut cluster = LocalCluster { process, data_dir };
    if let Err(err) = wait_for_ready(&pg_isready, port) {
        let _ = cluster.process.kill();
        let _ = fs::remove_dir_all(&cluster.data_dir);
        return Err(err);
    }
    Ok(cluster)
}

fn resolve_binary(name: &str) -> Result<PathBuf> {
    let mut search_paths = vec![
        PathBuf::from("/usr/lib/postgresql/16/bin"),
        PathBuf::from("/opt/homebrew/opt/postgresql@16/bin"),
        PathBuf::from("/usr/local/opt/postgresql@16/bin"),
    ];
    if let Some(paths) = std::env::var_os("PATH") {
        search_paths.extend(std::env::split_paths(&paths));
    }

    search_paths
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| anyhow!("{name} binary is required for Postgres tests"))
}

fn reserve_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve port")?;
    let port = listener
        .local_addr()
        .context("failed to read listener address")?
        .port();
    drop(listener);
    Ok(port)
}

fn create_data_dir() -> Result<PathBuf> {
    let base = std::env::temp_dir().join("rpcgate-postgres");
    fs::create_dir_all(&base)
        .with_context(|| format!("failed to create base dir {}", base.display()))?;
    let candidate = base.join(format!("cluster-{}-{}", std::process::id(), nanos()));
    fs::create_dir_all(&candidate)
        .with_context(|| format!("failed to create data dir {}", candidate.display()))?;
    Ok(candidate)
}

fn wait_for_ready(pg_isready: &Path, port: u16) -> Result<()> {
    for _ in 0..READY_ATTEMPTS {
        let ready = Command::new(pg_isready)
            .args(["-h", "127.0.0.1", "-p", &port.to_string(), "-U", "postgres"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        if ready {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(200));
    }
    bail!("postgres process did not become ready in time")
}

/// Run one admin statement on a dedicated thread so async tests can call it freely.
fn run_admin(admin_url: &str, statement: String) -> Result<()> {
    let admin_url = admin_url.to_string();
    thread::spawn(move || -> Result<()> {
        let config = postgres::Config::from_str(&admin_url)?;
        let mut client = config.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .with_context(|| format!("failed to run admin statement: {statement}"))
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow!("admin statement thread panicked")))
}

fn nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn unique_database_name() -> String {
    format!("rpcgate_test_{}_{}", std::process::id(), nanos())
}
