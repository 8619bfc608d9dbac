//! Yahoo! JAPAN ジオコーダAPI
//!
//! Les coordonnées arrivent sous forme de texte `"lon,lat"`.

use serde_json::Value;

use super::{
    first_item, json_text, trimmed_address, GeocodeResult, Geocoder, HttpRequest, HttpTransport,
    ProviderKind, Throttle, EMPTY_ADDRESS, PARSE_ERROR, ZERO_RESULTS,
};

const BASE_URL: &str = "https://map.yahooapis.jp/geocode/V1/geoCoder";

pub struct YahooJpGeocoder {
    appid: String,
    transport: Box<dyn HttpTransport>,
    throttle: Throttle,
}

impl YahooJpGeocoder {
    pub fn new(appid: impl Into<String>, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            appid: appid.into(),
            transport,
            throttle: Throttle::for_provider(ProviderKind::YahooJp),
        }
    }
}

/// Parse `"lon,lat"` (champs supplémentaires ignorés)
fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.split(',');
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    (lon.is_finite() && lat.is_finite()).then_some((lon, lat))
}

impl Geocoder for YahooJpGeocoder {
    fn geocode(&mut self, address: &str) -> GeocodeResult {
        let Some(address) = trimmed_address(address) else {
            return GeocodeResult::fail_empty(EMPTY_ADDRESS);
        };
        if self.appid.is_empty() {
            return GeocodeResult::fail_empty("Missing Yahoo Japan AppID");
        }

        self.throttle.wait();
        let request = HttpRequest::get(BASE_URL, ProviderKind::YahooJp.timeout())
            .query("appid", self.appid.as_str())
            .query("query", address)
            .query("output", "json")
            .query("results", "1");
        let document = match self.transport.get_json(&request) {
            Ok(document) => document,
            Err(e) => return GeocodeResult::fail_empty(e.to_string()),
        };

        let Some(first) = first_item(&document, "Feature") else {
            return GeocodeResult::fail(ZERO_RESULTS, document);
        };

        let coords = first
            .pointer("/Geometry/Coordinates")
            .and_then(Value::as_str)
            .and_then(parse_coordinates);
        let Some((lon, lat)) = coords else {
            return GeocodeResult::fail(PARSE_ERROR, first.clone());
        };

        let precision = json_text(first.pointer("/Property/MatchLevel"));
        GeocodeResult::ok(lon, lat, precision, first.clone())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::YahooJp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::mock::MockTransport;
    use serde_json::json;

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("139.7454,35.6586"), Some((139.7454, 35.6586)));
        assert_eq!(parse_coordinates(" 139.7 , 35.6 ,0"), Some((139.7, 35.6)));
        assert_eq!(parse_coordinates("139.7"), None);
        assert_eq!(parse_coordinates(""), None);
    }

    #[test]
    fn test_success() {
        let transport = MockTransport::replying(json!({
            "ResultInfo": {"Count": 1},
            "Feature": [{
                "Id": "13103.27.4.2.8",
                "Name": "東京都港区芝公園4丁目2-8",
                "Geometry": {"Type": "point", "Coordinates": "139.74543,35.65858"},
                "Property": {"AddressMatchingLevel": "6", "MatchLevel": 4}
            }]
        }));
        let mut geocoder = YahooJpGeocoder::new("APPID", Box::new(transport.clone()));

        let result = geocoder.geocode("東京都港区芝公園4-2-8");
        assert!(result.is_ok());
        assert_eq!(result.lon, Some(139.74543));
        assert_eq!(result.lat, Some(35.65858));
        assert_eq!(result.precision.as_deref(), Some("4"));

        let request = transport.last_request();
        assert_eq!(request.query_value("appid"), Some("APPID"));
        assert_eq!(request.query_value("output"), Some("json"));
        assert_eq!(request.query_value("results"), Some("1"));
    }

    #[test]
    fn test_failures() {
        let transport = MockTransport::with_responses(vec![
            Ok(json!({"ResultInfo": {"Count": 0}})),
            Ok(json!({"Feature": [{"Geometry": {"Coordinates": "bad"}}]})),
        ]);
        let mut geocoder = YahooJpGeocoder::new("APPID", Box::new(transport));
        assert_eq!(geocoder.geocode("a").error.as_deref(), Some("Zero results"));
        assert_eq!(geocoder.geocode("b").error.as_deref(), Some("Parse error"));

        let mut geocoder = YahooJpGeocoder::new("", Box::new(MockTransport::default()));
        assert_eq!(
            geocoder.geocode("a").error.as_deref(),
            Some("Missing Yahoo Japan AppID")
        );
    }
}
