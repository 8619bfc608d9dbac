//! Géocodeurs: un client par fournisseur, contrat commun adresse -> résultat
//!
//! Chaque adaptateur est synchrone et bloquant. Il ne renvoie jamais d'erreur
//! Rust: tout échec (adresse vide, clé absente, réseau, JSON, statut) devient un
//! résultat `FAIL` avec un message.

pub mod google;
pub mod here;
pub mod mapbox;
pub mod nominatim;
pub mod opencage;
pub mod yahoojp;

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use crate::config::Settings;

pub use google::GoogleGeocoder;
pub use here::HereGeocoder;
pub use mapbox::MapboxGeocoder;
pub use nominatim::NominatimGeocoder;
pub use opencage::OpenCageGeocoder;
pub use yahoojp::YahooJpGeocoder;

/// Message renvoyé pour une adresse vide
pub const EMPTY_ADDRESS: &str = "Empty address";

/// Message renvoyé quand les coordonnées du premier résultat sont illisibles
pub const PARSE_ERROR: &str = "Parse error";

/// Message générique pour une collection de résultats vide
pub const ZERO_RESULTS: &str = "Zero results";

/// Statut d'un géocodage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Fail,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Résultat d'un géocodage
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub status: Status,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    /// Libellé de précision propre au fournisseur
    pub precision: Option<String>,
    pub error: Option<String>,
    /// Document JSON natif (premier résultat en cas de succès)
    pub raw: Value,
}

impl GeocodeResult {
    pub fn ok(lon: f64, lat: f64, precision: Option<String>, raw: Value) -> Self {
        Self {
            status: Status::Ok,
            lon: Some(lon),
            lat: Some(lat),
            precision,
            error: None,
            raw,
        }
    }

    pub fn fail(error: impl Into<String>, raw: Value) -> Self {
        Self {
            status: Status::Fail,
            lon: None,
            lat: None,
            precision: None,
            error: Some(error.into()),
            raw,
        }
    }

    /// Échec sans document (validation, réseau)
    pub fn fail_empty(error: impl Into<String>) -> Self {
        Self::fail(error, empty_raw())
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Fournisseurs disponibles, dans l'ordre d'affichage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Nominatim,
    Google,
    Mapbox,
    OpenCage,
    YahooJp,
    Here,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Nominatim,
        ProviderKind::Google,
        ProviderKind::Mapbox,
        ProviderKind::OpenCage,
        ProviderKind::YahooJp,
        ProviderKind::Here,
    ];

    /// Identifiant interne persisté dans les réglages
    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Nominatim => "nominatim",
            ProviderKind::Google => "google",
            ProviderKind::Mapbox => "mapbox",
            ProviderKind::OpenCage => "opencage",
            ProviderKind::YahooJp => "yahoojp",
            ProviderKind::Here => "here",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Nominatim => "Nominatim",
            ProviderKind::Google => "Google",
            ProviderKind::Mapbox => "Mapbox",
            ProviderKind::OpenCage => "OpenCage",
            ProviderKind::YahooJp => "Yahoo!ジオコーダAPI",
            ProviderKind::Here => "HERE",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL.into_iter().find(|k| k.id().eq_ignore_ascii_case(id))
    }

    /// Intervalle minimal entre deux requêtes
    pub fn min_interval(self) -> Duration {
        match self {
            ProviderKind::Nominatim => Duration::from_millis(1000),
            ProviderKind::OpenCage | ProviderKind::YahooJp => Duration::from_millis(100),
            ProviderKind::Google | ProviderKind::Mapbox | ProviderKind::Here => {
                Duration::from_millis(50)
            }
        }
    }

    /// Timeout HTTP
    pub fn timeout(self) -> Duration {
        match self {
            ProviderKind::Nominatim => Duration::from_secs(15),
            _ => Duration::from_secs(20),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|k| k.id()).collect();
            format!("Unknown provider: {}. Use: {}", s, known.join(", "))
        })
    }
}

/// Contrat commun des géocodeurs
pub trait Geocoder: Send {
    /// Géocode une adresse (bloquant, ne panique pas sur une erreur réseau)
    fn geocode(&mut self, address: &str) -> GeocodeResult;

    fn kind(&self) -> ProviderKind;
}

/// Erreurs de transport HTTP
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP error {0}")]
    Status(u16),

    #[error("Invalid JSON response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Requête GET décrite indépendamment du client HTTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// Valeur d'un paramètre de requête
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport HTTP: un GET, une réponse JSON
pub trait HttpTransport: Send {
    fn get_json(&self, request: &HttpRequest) -> Result<Value, TransportError>;
}

/// Transport de production basé sur `reqwest::blocking`
///
/// À construire hors d'un contexte async (par ex. dans `spawn_blocking`).
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get_json(&self, request: &HttpRequest) -> Result<Value, TransportError> {
        let mut builder = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>()?)
    }
}

/// Limiteur de débit: intervalle minimal entre deux appels
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn for_provider(kind: ProviderKind) -> Self {
        Self::new(kind.min_interval())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Attend si nécessaire, puis note l'instant de l'appel
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                trace!("Rate limiting: waiting {:?}", wait_time);
                std::thread::sleep(wait_time);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Construit le géocodeur d'un fournisseur à partir des réglages
pub fn build_geocoder(
    kind: ProviderKind,
    settings: &Settings,
    transport: Box<dyn HttpTransport>,
) -> Box<dyn Geocoder> {
    let credential = settings.credential(kind).to_string();
    match kind {
        ProviderKind::Nominatim => Box::new(NominatimGeocoder::new(credential, transport)),
        ProviderKind::Google => Box::new(GoogleGeocoder::new(credential, transport)),
        ProviderKind::Mapbox => Box::new(MapboxGeocoder::new(credential, transport)),
        ProviderKind::OpenCage => Box::new(OpenCageGeocoder::new(credential, transport)),
        ProviderKind::YahooJp => Box::new(YahooJpGeocoder::new(credential, transport)),
        ProviderKind::Here => Box::new(HereGeocoder::new(credential, transport)),
    }
}

/// Adresse nettoyée, `None` si vide
pub(crate) fn trimmed_address(address: &str) -> Option<&str> {
    let trimmed = address.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub(crate) fn empty_raw() -> Value {
    Value::Object(Map::new())
}

/// Lit un nombre JSON ou une chaîne numérique
pub(crate) fn json_f64(value: Option<&Value>) -> Option<f64> {
    let v = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Texte d'une valeur JSON scalaire (`None` pour null/absent)
pub(crate) fn json_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Premier élément d'un tableau JSON, `None` si absent ou vide
pub(crate) fn first_item<'a>(document: &'a Value, key: &str) -> Option<&'a Value> {
    document.get(key)?.as_array()?.first()
}

#[cfg(test)]
pub(crate) mod mock {
    //! Transport simulé pour les tests des adaptateurs

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Réponses scriptées, requêtes enregistrées
    #[derive(Clone, Default)]
    pub struct MockTransport {
        responses: Arc<Mutex<VecDeque<Result<Value, TransportError>>>>,
        pub requests: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl MockTransport {
        pub fn with_responses(responses: Vec<Result<Value, TransportError>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                requests: Arc::default(),
            }
        }

        pub fn replying(value: Value) -> Self {
            Self::with_responses(vec![Ok(value)])
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl HttpTransport for MockTransport {
        fn get_json(&self, request: &HttpRequest) -> Result<Value, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Request("no scripted response".into())))
        }
    }
}
