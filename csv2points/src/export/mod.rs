//! Modules d'export

pub mod geojson;

pub use geojson::export_store;
