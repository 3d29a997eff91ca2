use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use std::path::PathBuf;
use tracing::info;
use verilis::commands;
use verilis::config::{ProviderConfig, DEFAULT_CONFIG_NAME};

#[derive(Parser)]
#[command(name = "verilis", version, about = "Incremental LLM translation of i18n resources")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a starter configuration file
    Init {
        /// Overwrite an existing configuration without asking
        #[arg(long)]
        force: bool,

        #[arg(long, default_value = DEFAULT_CONFIG_NAME)]
        config: PathBuf,
    },
    /// Translate every resource key missing from the output snapshots
    Generate {
        #[arg(long, default_value = DEFAULT_CONFIG_NAME)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("verilis=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init { force, config } => {
            if config.exists() && !force {
                let overwrite = Confirm::new()
                    .with_prompt(format!("{} already exists. Overwrite it?", config.display()))
                    .default(false)
                    .interact()?;
                if !overwrite {
                    info!("Keeping existing configuration");
                    return Ok(());
                }
            }
            commands::write_starter_config(&config)?;
        }
        Command::Generate { config } => {
            info!("Starting translation run");
            let report = commands::generate(&config, &ProviderConfig::from_env()).await?;

            println!("{}", commands::format_report(&report));

            if !report.all_succeeded() {
                anyhow::bail!(
                    "Translation failed for: {}",
                    report.failed_languages().join(", ")
                );
            }
            info!("All languages are up to date");
        }
    }

    Ok(())
}
