mod doctor_commands;
mod files_commands;
mod scrape_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    shelfscan_config::ShelfscanConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "shelfscan", about = "shelfscan: listing-page product harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./shelfscan.toml and the user config dir).
    #[arg(long, global = true, env = "SHELFSCAN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a browser through a listing page and save what it finds.
    Scrape(scrape_commands::ScrapeArgs),
    /// Re-parse a saved HTML snapshot.
    Parse {
        /// Snapshot file.
        file: PathBuf,
    },
    /// Check config, browser availability and the output directory.
    Doctor {
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List saved snapshots and product files.
    Files {
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ShelfscanConfig> {
    match path {
        Some(p) => shelfscan_config::load_config(p)
            .with_context(|| format!("failed to load config from {}", p.display())),
        None => Ok(shelfscan_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "shelfscan starting");

    match cli.command {
        Commands::Scrape(args) => {
            let config = load_config(cli.config.as_ref())?;
            scrape_commands::handle_scrape(config, args).await
        },
        Commands::Parse { file } => {
            let config = load_config(cli.config.as_ref())?;
            scrape_commands::handle_parse(&config, file)
        },
        Commands::Doctor { output_dir } => doctor_commands::handle_doctor(cli.config, output_dir),
        Commands::Files { output_dir } => {
            let config = load_config(cli.config.as_ref())?;
            files_commands::handle_files(&config, output_dir)
        },
    }
}
