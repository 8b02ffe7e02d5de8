use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use race_telemetry_sync::{cli, report::RunStatus};
use std::path::Path;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Race Telemetry Sync: -{rtsync}-> moves race telemetry from the document store into the relational warehouse
#[derive(Parser)]
#[command(name = "rtsync", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full extract-transform-load pipeline once
    Run {
        /// Also write the raw extraction snapshot to this file
        #[arg(long)]
        dump_raw: Option<String>,

        /// Write the structured run report to this file as JSON
        #[arg(long)]
        report: Option<String>,
    },

    /// Test connectivity to both stores
    Check,

    /// Extract all collections to a local snapshot file without loading
    Snapshot {
        /// The file to save the raw snapshot to
        #[arg(default_value = "snapshot.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Credentials may come from the environment directly; a missing dotenv
    // file is not an error.
    let env_loaded = dotenvy::from_filename(&cli.env).is_ok();

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if !env_loaded {
        log::debug!("No dotenv file loaded from {}", cli.env.bright_black());
    }

    match cli.command {
        Commands::Run { dump_raw, report } => {
            log::info!("Running telemetry sync");
            let outcome = cli::run_sync(
                dump_raw.as_deref().map(Path::new),
                report.as_deref().map(Path::new),
            )
            .await?;
            if outcome.overall == RunStatus::Fatal {
                if let Some(error) = outcome.fatal {
                    return Err(error.into());
                }
            }
        }
        Commands::Check => {
            log::info!("Testing store connections");
            cli::check_connections().await?;
        }
        Commands::Snapshot { output } => {
            log::info!("Saving snapshot to: {}", output.bright_black());
            cli::dump_snapshot(&output).await?;
        }
    }

    Ok(())
}
