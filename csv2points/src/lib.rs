//! # csv2points
//!
//! Conversion de fichiers CSV en couches de points, depuis des colonnes de
//! coordonnées ou par géocodage d'adresses.
//!
//! ## Features
//!
//! - Six géocodeurs (Nominatim, Google, Mapbox, OpenCage, Yahoo! JAPAN, HERE)
//!   avec limitation de débit par fournisseur
//! - Passe de géocodage en masse: annulable, appliquée en une seule écriture
//! - Normalisation des réponses vers un schéma d'attributs commun
//! - Export GeoJSON streaming (geozero)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Coordonnées présentes dans le fichier
//! csv2points points --input ./shops.csv --output ./shops.geojson
//!
//! # Géocodage d'une colonne d'adresse
//! csv2points geocode --input ./shops.csv --output ./shops.geojson --provider google
//! ```

pub mod config;
pub mod export;
pub mod geocode;
pub mod report;
pub mod store;
pub mod task;

pub use config::Settings;
pub use geocode::{build_geocoder, GeocodeResult, Geocoder, ProviderKind, Status};
pub use report::{GeocodeReport, GeocodeStatus};
pub use store::{AttrValue, FeatureStore, MemoryStore};
pub use task::{CancelToken, Completion, GeocodePass};
