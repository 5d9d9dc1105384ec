//! `tickvisord`: runs ticker workers against a PostgreSQL cluster.
//!
//! ```text
//! tickvisord --database-url postgres://localhost/postgres --config tickvisor.toml --launch app
//! ```
//!
//! `SIGHUP` reloads the config file; `SIGTERM`/`SIGINT` shut down gracefully.

use std::io::IsTerminal as _;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tickvisor::{
    register_static_workers, ConfigStore, FileSettings, Host, HostConfig, LaunchError, Launcher,
    LogWriter, PgEngine, ProcessId, ReplicationSets, Subscribe,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

const LOG_ENV_VAR: &str = "TICKVISOR_LOG";

#[derive(Debug, Parser)]
#[command(name = "tickvisord", version, about = "Supervised database heartbeat workers")]
struct Args {
    /// Ticker settings file (`[ticker]` table). Missing file means defaults.
    #[arg(long, short, default_value = "tickvisor.toml")]
    config: PathBuf,

    /// Connection URL used for catalog lookups; workers reuse its credentials.
    #[arg(long, env = "TICKVISOR_DATABASE_URL")]
    database_url: String,

    /// Number of worker slots.
    #[arg(long, default_value_t = 8)]
    max_workers: usize,

    /// Seconds to wait for workers on shutdown.
    #[arg(long, default_value_t = 10)]
    grace: u64,

    /// Launch a dynamic ticker for this database (repeatable).
    #[arg(long = "launch", value_name = "DBNAME")]
    launch: Vec<String>,

    /// Only launch dynamic tickers on databases with pglogical replication sets.
    #[arg(long)]
    replicated_only: bool,
}

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var(LOG_ENV_VAR)
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .init();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let config = ConfigStore::load(Arc::new(FileSettings::new(&args.config)))
        .with_context(|| format!("loading ticker settings from {}", args.config.display()))?;
    let engine = PgEngine::from_url(&args.database_url).context("parsing database url")?;

    let host_cfg = HostConfig {
        grace: Duration::from_secs(args.grace),
        max_worker_processes: args.max_workers,
        ..HostConfig::default()
    };
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let host = Host::builder(host_cfg, Arc::new(engine.clone()), config)
        .with_subscribers(subscribers)
        .build();

    register_static_workers(&host);

    if !args.launch.is_empty() {
        let launcher = Launcher::new(Arc::clone(&host));
        let predicate = args.replicated_only.then(|| ReplicationSets::new(engine));
        let databases = args.launch;
        tokio::spawn(async move {
            for database in databases {
                let res = match &predicate {
                    Some(p) => launcher.launch_if(&database, p).await,
                    None => launcher.launch(&database).await,
                };
                report_launch(&database, res);
            }
        });
    }

    host.run().await.context("host shutdown")?;
    Ok(())
}

fn report_launch(database: &str, res: Result<Option<ProcessId>, LaunchError>) {
    match res {
        Ok(Some(pid)) => tracing::info!(database, %pid, "ticker started"),
        Ok(None) => tracing::info!(database, "ticker not launched (already running, declined, or no free slot)"),
        Err(e) => tracing::error!(
            database,
            error = %e,
            label = e.as_label(),
            hint = e.hint().unwrap_or_default(),
            "ticker launch failed"
        ),
    }
}
