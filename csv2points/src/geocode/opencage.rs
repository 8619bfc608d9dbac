//! OpenCage Geocoding API (géocodage direct uniquement)

use super::{
    first_item, json_f64, json_text, trimmed_address, GeocodeResult, Geocoder, HttpRequest,
    HttpTransport, ProviderKind, Throttle, EMPTY_ADDRESS, PARSE_ERROR, ZERO_RESULTS,
};

const BASE_URL: &str = "https://api.opencagedata.com/geocode/v1/json";

pub struct OpenCageGeocoder {
    key: String,
    transport: Box<dyn HttpTransport>,
    throttle: Throttle,
}

impl OpenCageGeocoder {
    pub fn new(key: impl Into<String>, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            key: key.into(),
            transport,
            throttle: Throttle::for_provider(ProviderKind::OpenCage),
        }
    }
}

impl Geocoder for OpenCageGeocoder {
    fn geocode(&mut self, address: &str) -> GeocodeResult {
        let Some(address) = trimmed_address(address) else {
            return GeocodeResult::fail_empty(EMPTY_ADDRESS);
        };
        if self.key.is_empty() {
            return GeocodeResult::fail_empty("Missing OpenCage key");
        }

        self.throttle.wait();
        let request = HttpRequest::get(BASE_URL, ProviderKind::OpenCage.timeout())
            .query("q", address)
            .query("key", self.key.as_str())
            .query("limit", "1")
            .query("no_annotations", "1");
        let document = match self.transport.get_json(&request) {
            Ok(document) => document,
            Err(e) => return GeocodeResult::fail_empty(e.to_string()),
        };

        let Some(first) = first_item(&document, "results") else {
            return GeocodeResult::fail(ZERO_RESULTS, document);
        };

        let geometry = first.get("geometry");
        let coords = geometry.and_then(|g| Some((json_f64(g.get("lng"))?, json_f64(g.get("lat"))?)));
        let Some((lon, lat)) = coords else {
            return GeocodeResult::fail(PARSE_ERROR, first.clone());
        };

        let precision = json_text(first.get("confidence")).map(|c| format!("confidence_{}", c));
        GeocodeResult::ok(lon, lat, precision, first.clone())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenCage
    }
}
