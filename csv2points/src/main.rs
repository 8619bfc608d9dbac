//! Point d'entrée CLI pour csv2points

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use csv2points::Settings;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Convertir des fichiers CSV en couches de points
#[derive(Parser)]
#[command(name = "csv2points")]
#[command(author, version)]
#[command(about = "Convertir un CSV en points GeoJSON, depuis des coordonnées ou par géocodage")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de réglages JSON (défaut: réglages intégrés + environnement)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let settings = Settings::resolve(cli.settings.as_deref())?;

    match cli.command {
        Commands::Inspect { csv } => {
            cli::cmd_inspect(&csv, &settings).await?;
        }
        Commands::Points {
            input,
            output,
            lat,
            lon,
        } => {
            info!(input = %input.display(), output = %output.display(), "Points depuis coordonnées");
            cli::cmd_points(&input, &output, lat, lon, &settings).await?;
        }
        Commands::Geocode {
            input,
            output,
            address,
            provider,
            report,
        } => {
            info!(input = %input.display(), output = %output.display(), "Géocodage");
            cli::cmd_geocode(
                &input,
                &output,
                address,
                provider,
                report.as_deref(),
                &settings,
            )
            .await?;
        }
        Commands::Providers => {
            cli::cmd_providers(&settings).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
