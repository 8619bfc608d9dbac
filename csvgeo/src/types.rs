//! Types de données pour le crate csvgeo

use std::fmt;

use geo::Point;

/// Axe d'une coordonnée géographique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Latitude, bornes [-90, 90]
    Latitude,
    /// Longitude, bornes [-180, 180]
    Longitude,
}

impl Axis {
    /// Valeur absolue maximale autorisée
    pub fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    /// Lettres d'hémisphère (positive, négative)
    pub fn hemispheres(self) -> (char, char) {
        match self {
            Axis::Latitude => ('N', 'S'),
            Axis::Longitude => ('E', 'W'),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => f.write_str("Latitude"),
            Axis::Longitude => f.write_str("Longitude"),
        }
    }
}

/// Métadonnées de base d'un fichier CSV
#[derive(Debug, Clone)]
pub struct CsvMeta {
    /// Encodage détecté
    pub encoding: &'static encoding_rs::Encoding,

    /// Séparateur de champs détecté
    pub delimiter: u8,

    /// Noms de colonnes (limités à `inspect::MAX_HEADER_FIELDS`)
    pub header: Vec<String>,
}

impl CsvMeta {
    /// Séparateur lisible pour l'affichage
    pub fn delimiter_label(&self) -> String {
        match self.delimiter {
            b'\t' => "\\t".to_string(),
            b' ' => "space".to_string(),
            d => (d as char).to_string(),
        }
    }
}

/// Une ligne CSV convertie en point
#[derive(Debug, Clone)]
pub struct PointRow {
    /// Index de la ligne de données (0 = première ligne après l'en-tête)
    pub index: usize,

    /// Valeurs brutes, complétées à la largeur de l'en-tête
    pub values: Vec<String>,

    /// Géométrie (lon, lat) si le parsing a réussi
    pub point: Option<Point<f64>>,

    /// Message d'erreur de parsing sinon
    pub parse_error: Option<String>,
}
