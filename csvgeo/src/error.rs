//! Types d'erreurs pour le crate csvgeo

use thiserror::Error;

use crate::types::Axis;

/// Erreurs pouvant survenir lors de la lecture d'un CSV ou du parsing de coordonnées
#[derive(Debug, Error)]
pub enum CsvGeoError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur du lecteur CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Texte de coordonnée non reconnu
    #[error("Cannot parse coordinate: {text}")]
    CoordinateParse { text: String },

    /// Coordonnée syntaxiquement valide mais hors bornes
    #[error("{axis} out of range: {value}")]
    OutOfRange { axis: Axis, value: f64 },

    /// Colonne absente de l'en-tête
    #[error("Column not found in header: {0}")]
    MissingColumn(String),

    /// Fichier sans ligne d'en-tête
    #[error("Empty header in {0}")]
    EmptyHeader(String),
}

impl CsvGeoError {
    /// Crée une erreur de parsing en conservant le texte d'origine
    pub fn coordinate(text: impl Into<String>) -> Self {
        Self::CoordinateParse { text: text.into() }
    }
}
