//! Tests d'intégration: fichier CSV -> inspection -> détection -> points

use std::path::PathBuf;

use csvgeo::{detect, inspect, Category, KeywordConfig};

fn write_fixture(name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_shift_jis_tab_file_to_points() {
    let content = "名称\t緯度\t経度\t住所\n\
        東京タワー\t35°39'31\"N\t139°44'44\"E\t東京都港区芝公園4-2-8\n\
        不明\t???\t139.0\t\n";
    let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(content);
    let path = write_fixture("csvgeo_it_sjis.tsv", &encoded);

    let meta = inspect::inspect(&path).unwrap();
    assert_eq!(meta.encoding.name(), "Shift_JIS");
    assert_eq!(meta.delimiter, b'\t');

    let detection = detect(&meta.header, &KeywordConfig::default());
    assert_eq!(detection.chosen_lat.as_deref(), Some("緯度"));
    assert_eq!(detection.chosen_lon.as_deref(), Some("経度"));
    assert_eq!(detection.chosen_address.as_deref(), Some("住所"));

    let (table, points) = csvgeo::load_points(&path, "緯度", "経度").unwrap();
    assert_eq!(table.header.len(), 4);
    assert_eq!(points.len(), 2);

    let tower = points[0].point.unwrap();
    assert!((tower.y() - 35.658_611).abs() < 1e-5);
    assert!((tower.x() - 139.745_555).abs() < 1e-5);
    assert_eq!(points[0].values[3], "東京都港区芝公園4-2-8");

    assert!(points[1].point.is_none());
    assert!(points[1].parse_error.is_some());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_semicolon_file_with_custom_keywords() {
    let path = write_fixture(
        "csvgeo_it_semicolon.csv",
        "station;nord;est\nA;45.1;5.7\nB;45.2;5.8\n".as_bytes(),
    );

    let meta = inspect::inspect(&path).unwrap();
    assert_eq!(meta.delimiter, b';');

    let keywords = KeywordConfig {
        lat: vec!["nord".into()],
        lon: vec!["est".into()],
        addr: vec![],
    };
    let detection = detect(&meta.header, &keywords);
    assert_eq!(detection.candidate_names(Category::Lat), vec!["nord"]);
    assert!(detection.has_lat_lon());

    let (_, points) = csvgeo::load_points(&path, "nord", "est").unwrap();
    assert!(points.iter().all(|p| p.point.is_some()));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_column_is_an_error() {
    let path = write_fixture("csvgeo_it_missing.csv", b"a,b\n1,2\n");
    let result = csvgeo::load_points(&path, "lat", "lon");
    assert!(matches!(result, Err(csvgeo::CsvGeoError::MissingColumn(_))));
    std::fs::remove_file(path).ok();
}
