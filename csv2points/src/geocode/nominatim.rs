//! Nominatim (OpenStreetMap)
//!
//! Politique d'usage: une requête par seconde au plus, User-Agent identifiant
//! l'utilisateur. Les résultats passés par le réseau sont mis en cache par
//! adresse (succès comme échecs) pour toute la durée de vie de l'instance.

use std::collections::HashMap;

use tracing::trace;

use super::{
    json_f64, json_text, trimmed_address, GeocodeResult, Geocoder, HttpRequest, HttpTransport,
    ProviderKind, Throttle, EMPTY_ADDRESS, PARSE_ERROR,
};

const BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Marqueur du User-Agent par défaut, refusé par la politique Nominatim
pub const DEFAULT_UA_MARKER: &str = "set your email";

pub struct NominatimGeocoder {
    user_agent: String,
    transport: Box<dyn HttpTransport>,
    throttle: Throttle,
    cache: HashMap<String, GeocodeResult>,
}

impl NominatimGeocoder {
    pub fn new(user_agent: impl Into<String>, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            user_agent: user_agent.into(),
            transport,
            throttle: Throttle::for_provider(ProviderKind::Nominatim),
            cache: HashMap::new(),
        }
    }

    /// Nombre d'adresses en cache
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn lookup(&mut self, address: &str) -> GeocodeResult {
        if self.user_agent.trim().is_empty()
            || self.user_agent.to_lowercase().contains(DEFAULT_UA_MARKER)
        {
            return GeocodeResult::fail_empty("User-Agent (email) not set");
        }

        self.throttle.wait();
        let request = HttpRequest::get(BASE_URL, ProviderKind::Nominatim.timeout())
            .query("q", address)
            .query("format", "jsonv2")
            .query("limit", "1")
            .query("addressdetails", "0")
            .header("User-Agent", self.user_agent.as_str())
            .header("Accept-Language", "ja,en;q=0.8");

        let document = match self.transport.get_json(&request) {
            Ok(document) => document,
            Err(e) => return GeocodeResult::fail_empty(e.to_string()),
        };

        let Some(item) = document.as_array().and_then(|items| items.first()) else {
            return GeocodeResult::fail_empty("No result");
        };

        match (json_f64(item.get("lon")), json_f64(item.get("lat"))) {
            (Some(lon), Some(lat)) => {
                let precision = json_text(item.get("type"));
                GeocodeResult::ok(lon, lat, precision, item.clone())
            }
            _ => GeocodeResult::fail(PARSE_ERROR, item.clone()),
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&mut self, address: &str) -> GeocodeResult {
        let Some(key) = trimmed_address(address) else {
            return GeocodeResult::fail_empty(EMPTY_ADDRESS);
        };
        if let Some(hit) = self.cache.get(key) {
            trace!(address = key, "Nominatim cache hit");
            return hit.clone();
        }

        let result = self.lookup(key);
        self.cache.insert(key.to_string(), result.clone());
        result
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Nominatim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::mock::MockTransport;
    use crate::geocode::Status;
    use serde_json::{json, Value};

    const UA: &str = "csv2points-tests/0.1 (ops@example.org)";

    fn hit() -> Value {
        json!([{
            "place_id": 123456,
            "lat": "35.6585805",
            "lon": "139.7454329",
            "type": "attraction",
            "place_rank": 30,
            "display_name": "東京タワー, 港区, 東京都, 日本"
        }])
    }

    #[test]
    fn test_success_and_headers() {
        let transport = MockTransport::replying(hit());
        let mut geocoder = NominatimGeocoder::new(UA, Box::new(transport.clone()));

        let result = geocoder.geocode("東京タワー");
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.lat, Some(35.6585805));
        assert_eq!(result.lon, Some(139.7454329));
        assert_eq!(result.precision.as_deref(), Some("attraction"));
        assert_eq!(result.raw["place_rank"], 30);

        let request = transport.last_request();
        assert_eq!(request.query_value("q"), Some("東京タワー"));
        assert_eq!(request.query_value("format"), Some("jsonv2"));
        assert_eq!(request.query_value("limit"), Some("1"));
        assert_eq!(request.query_value("addressdetails"), Some("0"));
        assert!(request
            .headers
            .contains(&("User-Agent".to_string(), UA.to_string())));
        assert!(request
            .headers
            .contains(&("Accept-Language".to_string(), "ja,en;q=0.8".to_string())));
    }

    #[test]
    fn test_cache_avoids_second_request() {
        let transport = MockTransport::replying(hit());
        let mut geocoder = NominatimGeocoder::new(UA, Box::new(transport.clone()));

        let first = geocoder.geocode("東京タワー");
        let second = geocoder.geocode("  東京タワー  ");
        assert_eq!(first, second);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(geocoder.cached(), 1);
    }

    #[test]
    fn test_failures_are_cached() {
        let transport = MockTransport::with_responses(vec![Ok(json!([])), Ok(hit())]);
        let mut geocoder = NominatimGeocoder::new(UA, Box::new(transport.clone()));

        let first = geocoder.geocode("nowhere");
        assert_eq!(first.error.as_deref(), Some("No result"));
        let second = geocoder.geocode("nowhere");
        assert_eq!(second, first);
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_default_user_agent_rejected() {
        let transport = MockTransport::default();
        let mut geocoder = NominatimGeocoder::new(
            "CsvToPoints/0.1 (Set Your Email)",
            Box::new(transport.clone()),
        );

        let result = geocoder.geocode("Tokyo");
        assert_eq!(result.error.as_deref(), Some("User-Agent (email) not set"));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_empty_address_not_cached() {
        let transport = MockTransport::default();
        let mut geocoder = NominatimGeocoder::new(UA, Box::new(transport));
        assert_eq!(geocoder.geocode("").error.as_deref(), Some("Empty address"));
        assert_eq!(geocoder.cached(), 0);
    }

    #[test]
    fn test_parse_error() {
        let transport = MockTransport::replying(json!([{"lat": "north", "lon": "139"}]));
        let mut geocoder = NominatimGeocoder::new(UA, Box::new(transport));
        let result = geocoder.geocode("x");
        assert_eq!(result.error.as_deref(), Some("Parse error"));
        assert_eq!(result.raw["lat"], "north");
    }
}
