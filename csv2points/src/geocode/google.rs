//! Google Geocoding API
//!
//! La précision est le premier type de place trouvé dans [`PRECISION_PRIORITY`],
//! sinon le premier type du résultat.

use serde_json::Value;
use tracing::debug;

use super::{
    first_item, json_f64, trimmed_address, GeocodeResult, Geocoder, HttpRequest, HttpTransport,
    ProviderKind, Throttle, EMPTY_ADDRESS, PARSE_ERROR,
};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Types de place, du plus précis au moins précis
pub const PRECISION_PRIORITY: &[&str] = &[
    "street_address",
    "premise",
    "subpremise",
    "route",
    "intersection",
    "plus_code",
    "neighborhood",
    "sublocality",
    "sublocality_level_1",
    "locality",
    "administrative_area_level_3",
    "administrative_area_level_2",
    "administrative_area_level_1",
    "country",
];

pub struct GoogleGeocoder {
    api_key: String,
    transport: Box<dyn HttpTransport>,
    throttle: Throttle,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            throttle: Throttle::for_provider(ProviderKind::Google),
        }
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&mut self, address: &str) -> GeocodeResult {
        let Some(address) = trimmed_address(address) else {
            return GeocodeResult::fail_empty(EMPTY_ADDRESS);
        };
        if self.api_key.is_empty() {
            return GeocodeResult::fail_empty("Missing Google API key");
        }

        self.throttle.wait();
        let request = HttpRequest::get(BASE_URL, ProviderKind::Google.timeout())
            .query("address", address)
            .query("key", self.api_key.as_str());
        let document = match self.transport.get_json(&request) {
            Ok(document) => document,
            Err(e) => return GeocodeResult::fail_empty(e.to_string()),
        };

        let status = document
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string();
        if status != "OK" {
            debug!(status = %status, "Google geocoding refused");
            return GeocodeResult::fail(status_message(&status), document);
        }

        let Some(first) = first_item(&document, "results") else {
            return GeocodeResult::fail("Empty results", document);
        };

        let location = first.pointer("/geometry/location");
        let coords = location.and_then(|loc| {
            Some((json_f64(loc.get("lng"))?, json_f64(loc.get("lat"))?))
        });
        let Some((lon, lat)) = coords else {
            return GeocodeResult::fail(PARSE_ERROR, first.clone());
        };

        let precision = precision_from_types(first.get("types"));
        GeocodeResult::ok(lon, lat, precision, first.clone())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }
}

/// Traduit un statut Google non-OK en message
pub fn status_message(status: &str) -> String {
    match status {
        "ZERO_RESULTS" => "Zero results".to_string(),
        "OVER_QUERY_LIMIT" => "Over query limit".to_string(),
        "REQUEST_DENIED" => "Request denied".to_string(),
        "INVALID_REQUEST" => "Invalid request".to_string(),
        other => other.to_string(),
    }
}

fn precision_from_types(types: Option<&Value>) -> Option<String> {
    let types: Vec<&str> = types?.as_array()?.iter().filter_map(Value::as_str).collect();
    PRECISION_PRIORITY
        .iter()
        .find(|p| types.contains(*p))
        .copied()
        .or_else(|| types.first().copied())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::mock::MockTransport;
    use crate::geocode::{Status, TransportError};
    use serde_json::json;

    fn tower() -> Value {
        json!({
            "status": "OK",
            "results": [{
                "formatted_address": "4 Chome-2-8 Shibakoen, Minato City, Tokyo 105-0011, Japan",
                "place_id": "ChIJCewJkL2LGGAR3Qmk0vCTGkg",
                "types": ["establishment", "point_of_interest", "premise"],
                "geometry": {
                    "location": {"lat": 35.6585805, "lng": 139.7454329},
                    "location_type": "ROOFTOP"
                }
            }]
        })
    }

    #[test]
    fn test_success() {
        let transport = MockTransport::replying(tower());
        let mut geocoder = GoogleGeocoder::new("KEY", Box::new(transport.clone()));

        let result = geocoder.geocode("  東京タワー ");
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.lat, Some(35.6585805));
        assert_eq!(result.lon, Some(139.7454329));
        assert_eq!(result.precision.as_deref(), Some("premise"));
        assert_eq!(result.raw["place_id"], "ChIJCewJkL2LGGAR3Qmk0vCTGkg");

        let request = transport.last_request();
        assert_eq!(request.url, BASE_URL);
        assert_eq!(request.query_value("address"), Some("東京タワー"));
        assert_eq!(request.query_value("key"), Some("KEY"));
    }

    #[test]
    fn test_missing_key_makes_no_call() {
        let transport = MockTransport::default();
        let mut geocoder = GoogleGeocoder::new("", Box::new(transport.clone()));

        let result = geocoder.geocode("Tokyo");
        assert_eq!(result.error.as_deref(), Some("Missing Google API key"));
        assert_eq!(result.raw, json!({}));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_empty_address() {
        let transport = MockTransport::default();
        let mut geocoder = GoogleGeocoder::new("KEY", Box::new(transport.clone()));
        assert_eq!(geocoder.geocode("   ").error.as_deref(), Some("Empty address"));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_status_mapping() {
        for (status, message) in [
            ("ZERO_RESULTS", "Zero results"),
            ("OVER_QUERY_LIMIT", "Over query limit"),
            ("REQUEST_DENIED", "Request denied"),
            ("INVALID_REQUEST", "Invalid request"),
            ("UNKNOWN_ERROR", "UNKNOWN_ERROR"),
        ] {
            let transport = MockTransport::replying(json!({"status": status, "results": []}));
            let mut geocoder = GoogleGeocoder::new("KEY", Box::new(transport));
            let result = geocoder.geocode("x");
            assert_eq!(result.status, Status::Fail);
            assert_eq!(result.error.as_deref(), Some(message));
            assert_eq!(result.raw["status"], status);
        }
    }

    #[test]
    fn test_ok_without_results() {
        let transport = MockTransport::replying(json!({"status": "OK", "results": []}));
        let mut geocoder = GoogleGeocoder::new("KEY", Box::new(transport));
        assert_eq!(geocoder.geocode("x").error.as_deref(), Some("Empty results"));
    }

    #[test]
    fn test_parse_error_keeps_record() {
        let transport = MockTransport::replying(json!({
            "status": "OK",
            "results": [{"place_id": "abc", "geometry": {}}]
        }));
        let mut geocoder = GoogleGeocoder::new("KEY", Box::new(transport));
        let result = geocoder.geocode("x");
        assert_eq!(result.error.as_deref(), Some("Parse error"));
        assert_eq!(result.raw, json!({"place_id": "abc", "geometry": {}}));
    }

    #[test]
    fn test_transport_error() {
        let transport = MockTransport::with_responses(vec![Err(TransportError::Status(503))]);
        let mut geocoder = GoogleGeocoder::new("KEY", Box::new(transport));
        let result = geocoder.geocode("x");
        assert_eq!(result.error.as_deref(), Some("HTTP error 503"));
        assert_eq!(result.raw, json!({}));
    }

    #[test]
    fn test_precision_priority() {
        assert_eq!(
            precision_from_types(Some(&json!(["locality", "political", "route"]))).as_deref(),
            Some("route")
        );
        assert_eq!(
            precision_from_types(Some(&json!(["political"]))).as_deref(),
            Some("political")
        );
        assert_eq!(precision_from_types(Some(&json!([]))), None);
        assert_eq!(precision_from_types(None), None);
    }
}
