//! Lecture complète d'un CSV et conversion en points

use std::path::Path;

use geo::Point;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::coord::{parse_lat, parse_lon};
use crate::types::{CsvMeta, PointRow};
use crate::CsvGeoError;

/// Contenu tabulaire d'un CSV décodé
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    /// En-tête complet
    pub header: Vec<String>,

    /// Lignes de données, toutes à la largeur de l'en-tête
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Index d'une colonne par son nom exact
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Index d'une colonne, erreur si absente
    pub fn require_column(&self, name: &str) -> Result<usize, CsvGeoError> {
        self.column_index(name)
            .ok_or_else(|| CsvGeoError::MissingColumn(name.to_string()))
    }
}

/// Lit un fichier CSV avec l'encodage et le séparateur détectés
///
/// Les lignes vides sont ignorées, les lignes courtes complétées par des
/// chaînes vides, les colonnes excédentaires tronquées.
pub fn read_table(path: &Path, meta: &CsvMeta) -> Result<CsvTable, CsvGeoError> {
    let bytes = std::fs::read(path)?;
    let text = crate::decode_with_encoding(&bytes, meta.encoding);
    parse_table(&text, meta.delimiter)
        .map_err(|e| match e {
            CsvGeoError::EmptyHeader(_) => CsvGeoError::EmptyHeader(path.display().to_string()),
            other => other,
        })
}

/// Parse un CSV déjà décodé
pub fn parse_table(text: &str, delimiter: u8) -> Result<CsvTable, CsvGeoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Err(CsvGeoError::EmptyHeader(String::new())),
    };

    let width = header.len();
    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    debug!(columns = width, rows = rows.len(), "CSV table read");

    Ok(CsvTable { header, rows })
}

/// Convertit chaque ligne en point à partir des colonnes lat/lon
///
/// Une coordonnée invalide n'interrompt pas la conversion: la ligne garde
/// une géométrie vide et le message dans `parse_error`.
pub fn build_points(
    table: &CsvTable,
    lat_field: &str,
    lon_field: &str,
) -> Result<Vec<PointRow>, CsvGeoError> {
    let idx_lat = table.require_column(lat_field)?;
    let idx_lon = table.require_column(lon_field)?;

    let points: Vec<PointRow> = table
        .rows
        .par_iter()
        .enumerate()
        .map(|(index, row)| {
            let parsed = parse_lat(&row[idx_lat])
                .and_then(|lat| parse_lon(&row[idx_lon]).map(|lon| Point::new(lon, lat)));
            let (point, parse_error) = match parsed {
                Ok(p) => (Some(p), None),
                Err(e) => (None, Some(e.to_string())),
            };
            PointRow {
                index,
                values: row.clone(),
                point,
                parse_error,
            }
        })
        .collect();

    let failed = points.iter().filter(|p| p.point.is_none()).count();
    if failed > 0 {
        warn!(failed, total = points.len(), "Rows with invalid coordinates");
    }

    Ok(points)
}
