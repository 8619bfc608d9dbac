//! # csvgeo
//!
//! Lecture de fichiers CSV contenant des coordonnées ou des adresses.
//!
//! ## Features
//!
//! - Parsing de coordonnées décimales et DMS (`35°39'29.1"N`, `35度39分29.1秒N`)
//! - Détection des colonnes lat/lon/adresse par mots-clés et score
//! - Détection de l'encodage (BOM, UTF-8 via `simdutf8`, Shift_JIS) et du séparateur
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use csvgeo::{detect, inspect, KeywordConfig};
//! use std::path::Path;
//!
//! let meta = inspect::inspect(Path::new("points.csv"))?;
//! let detection = detect(&meta.header, &KeywordConfig::default());
//!
//! if let (Some(lat), Some(lon)) = (&detection.chosen_lat, &detection.chosen_lon) {
//!     let (_table, points) = csvgeo::load_points(Path::new("points.csv"), lat, lon)?;
//!     println!("{} points", points.len());
//! }
//! ```

pub mod coord;
pub mod detect;
pub mod error;
pub mod inspect;
pub mod reader;
pub mod types;

pub use coord::{format_dms, parse_dms, parse_lat, parse_lon};
pub use detect::{detect, Category, Detection, FieldCandidate, KeywordConfig};
pub use error::CsvGeoError;
pub use reader::CsvTable;
pub use types::{Axis, CsvMeta, PointRow};

use std::path::Path;

/// Inspecte puis convertit un CSV en points.
///
/// # Arguments
///
/// * `path` - Chemin du fichier CSV
/// * `lat_field` / `lon_field` - Noms exacts des colonnes de coordonnées
///
/// # Errors
///
/// Retourne `CsvGeoError` si le fichier est illisible, sans en-tête, ou si une
/// des deux colonnes est absente. Les cellules invalides ne sont pas des erreurs:
/// elles sont rapportées ligne par ligne dans `PointRow::parse_error`.
pub fn load_points(
    path: &Path,
    lat_field: &str,
    lon_field: &str,
) -> Result<(CsvTable, Vec<PointRow>), CsvGeoError> {
    let meta = inspect::inspect(path)?;
    let table = reader::read_table(path, &meta)?;
    let points = reader::build_points(&table, lat_field, lon_field)?;
    Ok((table, points))
}

/// Décode les bytes avec l'encodage détecté
pub(crate) fn decode_with_encoding(data: &[u8], encoding: &'static encoding_rs::Encoding) -> String {
    let (decoded, _, _) = encoding.decode(data);
    decoded.into_owned()
}
