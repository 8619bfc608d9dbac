//! Export d'un stockage de points vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{Map, Value};
use tracing::debug;

use crate::store::{Feature, FeatureStore};

/// Exporte toutes les features du stockage (EPSG:4326)
///
/// Les features sans géométrie sont écrites avec `"geometry":null`.
pub fn export_store(store: &dyn FeatureStore, output_path: &Path) -> Result<usize> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    let count = write_collection(&mut writer, store)?;
    writer.flush()?;

    debug!(features = count, output = %output_path.display(), "GeoJSON written");
    Ok(count)
}

/// Écrit la FeatureCollection complète
pub fn write_collection<W: Write>(writer: &mut W, store: &dyn FeatureStore) -> Result<usize> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::4326"}}}},"features":["#
    )?;

    let mut count = 0;
    for feature in store.features() {
        if count > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, store.fields(), feature)?;
        count += 1;
    }

    write!(writer, "]}}")?;
    Ok(count)
}

fn write_feature<W: Write>(writer: &mut W, fields: &[String], feature: &Feature) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":{},"geometry":"#, feature.id)?;

    match feature.geometry {
        Some(point) => {
            let mut geom_buf = Vec::new();
            let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
            Geometry::Point(point).process_geom(&mut geom_writer)?;
            writer.write_all(&geom_buf)?;
        }
        None => write!(writer, "null")?,
    }

    let properties: Map<String, Value> = fields
        .iter()
        .zip(&feature.attributes)
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &properties)?;
    write!(writer, "}}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AttrValue, MemoryStore};
    use geo::Point;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(vec!["name".to_string(), "note".to_string()]);
        store.add_feature(
            Some(Point::new(139.7454, 35.6586)),
            vec!["タワー".into(), "a \"quoted\" note".into()],
        );
        store.add_feature(None, vec!["none".into(), AttrValue::Null]);
        store
    }

    #[test]
    fn test_write_collection() {
        let mut buffer = Vec::new();
        let count = write_collection(&mut buffer, &store()).unwrap();
        assert_eq!(count, 2);

        let doc: Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);

        assert_eq!(features[0]["id"], 1);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["geometry"]["coordinates"][0], 139.7454);
        assert_eq!(features[0]["properties"]["name"], "タワー");
        assert_eq!(features[0]["properties"]["note"], "a \"quoted\" note");

        assert!(features[1]["geometry"].is_null());
        assert!(features[1]["properties"]["note"].is_null());
    }

    #[test]
    fn test_export_store() {
        let output_path = std::env::temp_dir().join("csv2points_export_test.geojson");
        let count = export_store(&store(), &output_path).unwrap();
        assert_eq!(count, 2);

        let content = std::fs::read_to_string(&output_path).unwrap();
        std::fs::remove_file(&output_path).ok();
        assert!(content.starts_with(r#"{"type":"FeatureCollection""#));
        assert!(content.contains("EPSG::4326"));
    }

    #[test]
    fn test_empty_store() {
        let mut buffer = Vec::new();
        let empty = MemoryStore::new(vec!["a".to_string()]);
        assert_eq!(write_collection(&mut buffer, &empty).unwrap(), 0);
        let doc: Value = serde_json::from_slice(&buffer).unwrap();
        assert!(doc["features"].as_array().unwrap().is_empty());
    }
}
