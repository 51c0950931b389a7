pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use claimscope_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "claimscope",
    about = "Claimscope operator CLI",
    long_about = "Assemble repair scope from inspection data, price it, and export interchange archives.",
    after_help = "Examples:\n  claimscope migrate\n  claimscope seed\n  claimscope assemble --session session-demo-001 --room room-demo-kitchen --damage damage-demo-kitchen-1\n  claimscope export --session session-demo-001 --out claim.esx"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Default, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to claimscope.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override pricing.region_id")]
    region: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override logging.format (compact|pretty|json)")]
    log_format: Option<LogFormat>,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                log_format: self.log_format,
                region_id: self.region.clone(),
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load a seed dataset (the bundled demo when --file is omitted)")]
    Seed {
        #[arg(long, help = "Dataset JSON with catalog, prices and inspection records")]
        file: Option<PathBuf>,
    },
    #[command(about = "Assemble scope items for one damage observation")]
    Assemble {
        #[arg(long)]
        session: String,
        #[arg(long)]
        room: String,
        #[arg(long)]
        damage: String,
    },
    #[command(about = "Price the active scope of a session")]
    Estimate {
        #[arg(long)]
        session: String,
    },
    #[command(about = "Write the interchange archive of a session")]
    Export {
        #[arg(long)]
        session: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, help = "Mark the export as a supplemental claim with this note")]
        supplemental_reason: Option<String>,
    },
    #[command(about = "List the per-room detail items of an interchange archive")]
    Inspect {
        #[arg(long)]
        file: PathBuf,
    },
}

/// Logs go to stderr so stdout carries only the command payload.
fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // a subscriber may already be installed when embedded
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed { file } => commands::seed::run(&options, file.as_deref()),
        Command::Assemble { session, room, damage } => {
            commands::assemble::run(&options, &session, &room, &damage)
        }
        Command::Estimate { session } => commands::estimate::run(&options, &session),
        Command::Export { session, out, supplemental_reason } => {
            commands::export::run(&options, &session, &out, supplemental_reason)
        }
        Command::Inspect { file } => commands::inspect::run(&file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
