//! Mapbox Geocoding API (v5, mapbox.places)
//!
//! L'adresse fait partie du chemin: `/mapbox.places/{adresse encodée}.json`.

use reqwest::Url;
use serde_json::Value;

use super::{
    first_item, json_f64, json_text, trimmed_address, GeocodeResult, Geocoder, HttpRequest,
    HttpTransport, ProviderKind, Throttle, EMPTY_ADDRESS, PARSE_ERROR, ZERO_RESULTS,
};

const BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

pub struct MapboxGeocoder {
    token: String,
    transport: Box<dyn HttpTransport>,
    throttle: Throttle,
}

impl MapboxGeocoder {
    pub fn new(token: impl Into<String>, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            token: token.into(),
            transport,
            throttle: Throttle::for_provider(ProviderKind::Mapbox),
        }
    }
}

/// URL de recherche avec l'adresse encodée comme segment de chemin
fn endpoint(address: &str) -> Option<String> {
    let mut url = Url::parse(BASE_URL).ok()?;
    url.path_segments_mut()
        .ok()?
        .push(&format!("{}.json", address));
    Some(url.into())
}

impl Geocoder for MapboxGeocoder {
    fn geocode(&mut self, address: &str) -> GeocodeResult {
        let Some(address) = trimmed_address(address) else {
            return GeocodeResult::fail_empty(EMPTY_ADDRESS);
        };
        if self.token.is_empty() {
            return GeocodeResult::fail_empty("Missing Mapbox token");
        }
        let Some(url) = endpoint(address) else {
            return GeocodeResult::fail_empty(format!("Invalid request URL for {}", address));
        };

        self.throttle.wait();
        let request = HttpRequest::get(url, ProviderKind::Mapbox.timeout())
            .query("access_token", self.token.as_str())
            .query("limit", "1");
        let document = match self.transport.get_json(&request) {
            Ok(document) => document,
            Err(e) => return GeocodeResult::fail_empty(e.to_string()),
        };

        let Some(first) = first_item(&document, "features") else {
            return GeocodeResult::fail(ZERO_RESULTS, document);
        };

        let coordinates = first
            .pointer("/geometry/coordinates")
            .and_then(Value::as_array);
        let coords = coordinates.and_then(|c| Some((json_f64(c.first())?, json_f64(c.get(1))?)));
        let Some((lon, lat)) = coords else {
            return GeocodeResult::fail(PARSE_ERROR, first.clone());
        };

        let precision = json_text(first.pointer("/place_type/0"));
        GeocodeResult::ok(lon, lat, precision, first.clone())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mapbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::mock::MockTransport;
    use crate::geocode::Status;
    use serde_json::json;

    #[test]
    fn test_endpoint_encodes_address() {
        assert_eq!(
            endpoint("Tokyo Tower").as_deref(),
            Some("https://api.mapbox.com/geocoding/v5/mapbox.places/Tokyo%20Tower.json")
        );
        let url = endpoint("東京/港区").unwrap();
        assert!(url.ends_with(".json"));
        assert!(!url.contains("東京"));
        assert!(url.contains("%2F"));
    }

    #[test]
    fn test_success() {
        let transport = MockTransport::replying(json!({
            "features": [{
                "id": "poi.123",
                "place_type": ["poi"],
                "place_name": "Tokyo Tower, Minato, Tokyo, Japan",
                "properties": {"accuracy": "point"},
                "geometry": {"type": "Point", "coordinates": [139.745433, 35.658581]},
                "context": [{"id": "postcode.42", "text": "105-0011"}]
            }]
        }));
        let mut geocoder = MapboxGeocoder::new("TOKEN", Box::new(transport.clone()));

        let result = geocoder.geocode("Tokyo Tower");
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.lon, Some(139.745433));
        assert_eq!(result.lat, Some(35.658581));
        assert_eq!(result.precision.as_deref(), Some("poi"));

        let request = transport.last_request();
        assert!(request.url.ends_with("/Tokyo%20Tower.json"));
        assert_eq!(request.query_value("access_token"), Some("TOKEN"));
        assert_eq!(request.query_value("limit"), Some("1"));
    }

    #[test]
    fn test_zero_results() {
        let transport = MockTransport::replying(json!({"features": []}));
        let mut geocoder = MapboxGeocoder::new("TOKEN", Box::new(transport));
        let result = geocoder.geocode("nowhere");
        assert_eq!(result.error.as_deref(), Some("Zero results"));
        assert_eq!(result.raw, json!({"features": []}));
    }

    #[test]
    fn test_missing_token() {
        let transport = MockTransport::default();
        let mut geocoder = MapboxGeocoder::new("", Box::new(transport.clone()));
        assert_eq!(
            geocoder.geocode("Tokyo").error.as_deref(),
            Some("Missing Mapbox token")
        );
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_short_coordinates() {
        let transport = MockTransport::replying(json!({
            "features": [{"geometry": {"coordinates": [139.7]}}]
        }));
        let mut geocoder = MapboxGeocoder::new("TOKEN", Box::new(transport));
        assert_eq!(geocoder.geocode("x").error.as_deref(), Some("Parse error"));
    }
}
