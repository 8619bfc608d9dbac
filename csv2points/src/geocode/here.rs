//! HERE Geocoding & Search API (endpoint geocode fixe)

use super::{
    first_item, json_f64, json_text, trimmed_address, GeocodeResult, Geocoder, HttpRequest,
    HttpTransport, ProviderKind, Throttle, EMPTY_ADDRESS, PARSE_ERROR, ZERO_RESULTS,
};

const BASE_URL: &str = "https://geocode.search.hereapi.com/v1/geocode";

pub struct HereGeocoder {
    api_key: String,
    transport: Box<dyn HttpTransport>,
    throttle: Throttle,
}

impl HereGeocoder {
    pub fn new(api_key: impl Into<String>, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            throttle: Throttle::for_provider(ProviderKind::Here),
        }
    }
}

impl Geocoder for HereGeocoder {
    fn geocode(&mut self, address: &str) -> GeocodeResult {
        let Some(address) = trimmed_address(address) else {
            return GeocodeResult::fail_empty(EMPTY_ADDRESS);
        };
        if self.api_key.is_empty() {
            return GeocodeResult::fail_empty("Missing HERE API key");
        }

        self.throttle.wait();
        let request = HttpRequest::get(BASE_URL, ProviderKind::Here.timeout())
            .query("q", address)
            .query("apiKey", self.api_key.as_str())
            .query("limit", "1");
        let document = match self.transport.get_json(&request) {
            Ok(document) => document,
            Err(e) => return GeocodeResult::fail_empty(e.to_string()),
        };

        let Some(first) = first_item(&document, "items") else {
            return GeocodeResult::fail(ZERO_RESULTS, document);
        };

        let position = first.get("position");
        let coords = position.and_then(|p| Some((json_f64(p.get("lng"))?, json_f64(p.get("lat"))?)));
        let Some((lon, lat)) = coords else {
            return GeocodeResult::fail(PARSE_ERROR, first.clone());
        };

        let precision = json_text(first.get("resultType"));
        GeocodeResult::ok(lon, lat, precision, first.clone())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Here
    }
}
