use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use osview::cloud::auth::IdentityInfo;
use osview::cloud::client::CloudClient;
use osview::cloud::http::format_cloud_error;
use osview::config::{self, Config};
use osview::graph::Topology;
use osview::report::{self, OverviewReport, Palette};
use osview::resource::{Fetcher, MemoryFetcher};
use osview::snapshot::Snapshot;
use osview::usage::{reconcile_compute, reconcile_network, reconcile_volume};
use osview::VERSION;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Read-only OpenStack project overview and port diagnostics
#[derive(Parser, Debug)]
#[command(name = "osview", version, about, long_about = None)]
struct Args {
    /// Cloud name from clouds.yaml
    #[arg(long, global = true, env = "OS_CLOUD")]
    cloud: Option<String>,

    /// Project to report on (defaults to the token's project)
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// Render from a replay file instead of a live cloud
    #[arg(long, global = true)]
    replay: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List ports with their bindings resolved
    Ports {
        /// Show every column
        #[arg(long)]
        wide: bool,

        /// Print JSON instead of a table
        #[arg(long, conflicts_with = "csv")]
        json: bool,

        /// Write CSV to FILE
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        /// Comma-separated column list
        #[arg(long, value_name = "a,b,c")]
        columns: Option<String>,
    },
    /// Project overview across networking, compute and block storage
    Overview {
        /// Disable ANSI colour
        #[arg(long)]
        no_color: bool,

        /// Wrap lines at N columns (0 disables wrapping)
        #[arg(long, value_name = "N")]
        max_width: Option<usize>,

        /// Print the overview rows and usage as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("osview {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("osview").join("osview.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".osview").join("osview.log");
    }
    PathBuf::from("osview.log")
}

/// Where the data comes from, and whose project it describes
struct Source {
    fetcher: Box<dyn Fetcher>,
    project_id: Option<String>,
    identity: IdentityInfo,
}

fn replay_source(path: &Path, project_id: Option<String>) -> Result<Source> {
    let memory = MemoryFetcher::load(path).context("Failed to load replay file")?;
    tracing::info!("Replaying {:?}", path);
    Ok(Source {
        project_id: project_id.or_else(|| memory.project_id.clone()),
        identity: memory.identity.clone().unwrap_or_default(),
        fetcher: Box::new(memory),
    })
}

async fn cloud_source(args: &Args, prefs: &Config) -> Result<Source> {
    let profile = config::load_profile(args.cloud.as_deref(), prefs.cloud.as_deref())?;
    let client = CloudClient::new(profile)?;
    let identity = client.identity().await.context("Authentication failed")?;
    tracing::info!(
        "Authenticated as {:?} in project {:?}",
        identity.user,
        identity.project
    );
    Ok(Source {
        project_id: args.project_id.clone().or_else(|| identity.project_id.clone()),
        identity,
        fetcher: Box::new(client),
    })
}

async fn run(args: Args, prefs: Config) -> Result<()> {
    let source = match &args.replay {
        Some(path) => replay_source(path, args.project_id.clone())?,
        None => cloud_source(&args, &prefs).await?,
    };
    let fetcher = source.fetcher.as_ref();

    let snapshot = Snapshot::fetch(fetcher, source.project_id.as_deref(), source.identity).await;
    let topology = Topology::new(&snapshot);

    match args.command {
        Command::Ports {
            wide,
            json,
            csv,
            columns,
        } => {
            let explicit = prefs.effective_columns(columns.as_deref(), wide);
            let columns = report::resolve_columns(explicit.as_deref(), wide)?;
            let rows = topology.port_rows(Utc::now());

            if let Some(path) = csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                report::write_csv(file, &rows, &columns)?;
                println!("Wrote {} rows to {}", rows.len(), path.display());
            } else if json {
                println!("{}", report::render_json(&rows, &columns)?);
            } else {
                println!("{}", report::render_table(&rows, &columns));
            }
        }
        Command::Overview {
            no_color,
            max_width,
            json,
        } => {
            let project_id = snapshot.project_id.clone().unwrap_or_default();
            let (compute, network, volume) = futures::join!(
                reconcile_compute(fetcher, &project_id, &snapshot.servers.items, &snapshot.flavors.items),
                reconcile_network(fetcher, &snapshot),
                reconcile_volume(fetcher, &snapshot),
            );
            let overview_report = OverviewReport {
                overview: topology.overview(),
                compute: compute.service_usage(),
                network,
                volume,
            };

            if json {
                let text = serde_json::to_string_pretty(&overview_report).context("Failed to serialize overview")?;
                println!("{}", text);
            } else {
                let palette = Palette::detect(prefs.color_requested(no_color));
                let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string();
                println!(
                    "{}",
                    report::render_overview(&overview_report, &palette, prefs.effective_max_width(max_width), &generated_at)
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let prefs = Config::load();

    if let Err(err) = run(args, prefs).await {
        tracing::error!("{:?}", err);
        eprintln!("Error: {}", format_cloud_error(&err));
        drop(_log_guard);
        std::process::exit(1);
    }

    Ok(())
}
