//! Définition et implémentation des commandes CLI
//!
//! - `inspect`: encodage, séparateur, en-tête et colonnes détectées
//! - `points`: CSV avec coordonnées → GeoJSON
//! - `geocode`: CSV avec adresses → GeoJSON via un fournisseur
//! - `providers`: fournisseurs disponibles

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{debug, info, warn};

use csv2points::config::{Settings, DEFAULT_USER_AGENT};
use csv2points::export::export_store;
use csv2points::geocode::{build_geocoder, ProviderKind, ReqwestTransport};
use csv2points::report::GeocodeReport;
use csv2points::store::{FeatureStore, MemoryStore};
use csv2points::task::{provider_fields, scan, GeocodePass, ScanOutcome};
use csvgeo::reader::{build_points, read_table};
use csvgeo::{detect, Category, Detection};

#[derive(Subcommand)]
pub enum Commands {
    /// Show encoding, delimiter, header and detected columns of a CSV file
    Inspect {
        /// Path to the CSV file
        csv: PathBuf,
    },

    /// Build a point layer from latitude/longitude columns
    Points {
        /// Path to the CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Latitude column (défaut: détection automatique)
        #[arg(long)]
        lat: Option<String>,

        /// Longitude column (défaut: détection automatique)
        #[arg(long)]
        lon: Option<String>,
    },

    /// Geocode an address column and build a point layer
    Geocode {
        /// Path to the CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Address column (défaut: détection automatique)
        #[arg(long)]
        address: Option<String>,

        /// Provider id (défaut: réglages / env CSV2POINTS_PROVIDER)
        #[arg(long)]
        provider: Option<String>,

        /// Save the geocoding report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List geocoding providers
    Providers,
}

/// Exécute la commande inspect
pub async fn cmd_inspect(csv: &Path, settings: &Settings) -> Result<()> {
    let meta = csvgeo::inspect::inspect(csv)
        .context(format!("Failed to inspect {}", csv.display()))?;
    let detection = detect(&meta.header, &settings.keywords());

    println!("=== {} ===", csv.display());
    println!("Encoding: {}", meta.encoding.name());
    println!("Delimiter: {}", meta.delimiter_label());
    println!("Columns ({}): {}", meta.header.len(), meta.header.join(", "));

    for category in Category::ALL {
        let candidates: Vec<String> = detection
            .candidates(category)
            .iter()
            .map(|c| format!("{} ({})", c.field, c.score))
            .collect();
        println!(
            "{} candidates: {}",
            category,
            if candidates.is_empty() {
                "-".to_string()
            } else {
                candidates.join(", ")
            }
        );
    }

    println!(
        "Chosen: lat={} lon={} address={}",
        detection.chosen_lat.as_deref().unwrap_or("-"),
        detection.chosen_lon.as_deref().unwrap_or("-"),
        detection.chosen_address.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// Exécute la commande points
pub async fn cmd_points(
    input: &Path,
    output: &Path,
    lat: Option<String>,
    lon: Option<String>,
    settings: &Settings,
) -> Result<()> {
    let start = Instant::now();
    let meta = csvgeo::inspect::inspect(input)
        .context(format!("Failed to inspect {}", input.display()))?;

    let (lat, lon) = match (lat, lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        (lat, lon) => {
            let detection = detect(&meta.header, &settings.keywords());
            let lat = lat
                .or(detection.chosen_lat.clone())
                .context(missing_column(&detection, Category::Lat, "--lat"))?;
            let lon = lon
                .or(detection.chosen_lon.clone())
                .context(missing_column(&detection, Category::Lon, "--lon"))?;
            (lat, lon)
        }
    };
    info!(lat = %lat, lon = %lon, "Coordinate columns");

    let table = read_table(input, &meta)?;
    let rows = build_points(&table, &lat, &lon)?;
    let failed = rows.iter().filter(|r| r.parse_error.is_some()).count();

    let store = MemoryStore::from_point_rows(&table.header, &rows);
    let written = export_store(&store, output)?;

    if failed > 0 {
        warn!(failed, "Rows without geometry (see _parse_error)");
    }
    if let Some(extent) = store.extent() {
        debug!(
            min_x = extent.min().x,
            min_y = extent.min().y,
            max_x = extent.max().x,
            max_y = extent.max().y,
            "Layer extent"
        );
    }

    println!(
        "{} features written to {} ({} without geometry) in {:.2}s",
        written,
        output.display(),
        failed,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn missing_column(detection: &Detection, category: Category, flag: &str) -> String {
    format!(
        "No {} column detected (candidates: {}); use {}",
        category,
        detection.candidate_names(category).join(", "),
        flag
    )
}

/// Exécute la commande geocode
pub async fn cmd_geocode(
    input: &Path,
    output: &Path,
    address: Option<String>,
    provider: Option<String>,
    report_path: Option<&Path>,
    settings: &Settings,
) -> Result<()> {
    let start = Instant::now();

    let kind = match provider.as_deref() {
        Some(id) => id.parse::<ProviderKind>().map_err(anyhow::Error::msg)?,
        None => settings.provider_kind()?,
    };
    if kind == ProviderKind::Nominatim && settings.nominatim_user_agent == DEFAULT_USER_AGENT {
        warn!("Nominatim requires a contact User-Agent; set NOMINATIM_USER_AGENT");
    }

    let meta = csvgeo::inspect::inspect(input)
        .context(format!("Failed to inspect {}", input.display()))?;
    let table = read_table(input, &meta)?;

    let address_field = match address {
        Some(field) => field,
        None => {
            let detection = detect(&table.header, &settings.keywords());
            detection
                .chosen_address
                .clone()
                .context(missing_column(&detection, Category::Addr, "--address"))?
        }
    };
    table.require_column(&address_field)?;

    let mut store = MemoryStore::from_table(&table.header, &table.rows, &provider_fields(kind));
    let pass = GeocodePass::new(address_field.as_str(), kind.into());
    let requests = pass.prepare(&store)?;
    let skipped = store.feature_count() - requests.len();

    info!(
        provider = %kind,
        address = %address_field,
        requests = requests.len(),
        skipped,
        "Starting geocoding"
    );

    // Ctrl-C annule la passe à la prochaine ligne
    let cancel = pass.cancel_token();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, canceling geocoding");
            interrupt.cancel();
        }
    });

    let worker_settings = settings.clone();
    let worker = tokio::task::spawn_blocking(move || -> Result<ScanOutcome> {
        let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;
        let mut geocoder = build_geocoder(kind, &worker_settings, Box::new(transport));
        let total = requests.len();
        let mut last_decile = 0;
        let mut progress = |percent: f64| {
            let decile = (percent / 10.0) as u32;
            if decile > last_decile {
                last_decile = decile;
                info!(total, "Geocoding {:.0}%", percent);
            }
        };
        Ok(scan(&mut *geocoder, &requests, &cancel, &mut progress))
    });
    let outcome = worker.await.context("Geocoding worker failed")??;
    watcher.abort();

    let completion = pass.finish(&mut store, &outcome);
    // Un Ctrl-C après le parcours annule aussi l'export
    let canceled = pass.was_canceled(&outcome);

    let mut report = GeocodeReport::new(kind, pass.address_field());
    report.record(&outcome, &completion, canceled);
    report.set_skipped(skipped);
    report.set_duration(start.elapsed());
    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context(format!("Failed to save report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    if canceled {
        warn!("Geocoding canceled, no output written");
        return Ok(());
    }

    let written = export_store(&store, output)?;
    println!("{} features written to {}", written, output.display());
    Ok(())
}

/// Exécute la commande providers
pub async fn cmd_providers(settings: &Settings) -> Result<()> {
    let current = settings.provider_kind().ok();

    println!("=== Providers ===");
    for kind in ProviderKind::ALL {
        let credential = settings.credential(kind);
        let configured = match kind {
            ProviderKind::Nominatim => credential != DEFAULT_USER_AGENT,
            _ => !credential.is_empty(),
        };
        println!(
            "{} {:<10} {:<24} {}",
            if current == Some(kind) { "*" } else { " " },
            kind.id(),
            kind.display_name(),
            if configured { "configured" } else { "not configured" }
        );
    }
    Ok(())
}
