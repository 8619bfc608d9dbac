//! Réglages persistés: fournisseur, identifiants, mots-clés de détection

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use csvgeo::KeywordConfig;

use crate::geocode::ProviderKind;

/// User-Agent par défaut de Nominatim (à personnaliser avant usage)
pub const DEFAULT_USER_AGENT: &str = "CsvToPoints/0.1 (set your email)";

/// Variables d'environnement reconnues, par champ
const ENV_OVERRIDES: &[(&str, Field)] = &[
    ("CSV2POINTS_PROVIDER", Field::Provider),
    ("GOOGLE_API_KEY", Field::GoogleApiKey),
    ("MAPBOX_TOKEN", Field::MapboxToken),
    ("OPENCAGE_KEY", Field::OpenCageKey),
    ("HERE_APIKEY", Field::HereApiKey),
    ("YAHOOJP_APPID", Field::YahooJpAppId),
    ("NOMINATIM_USER_AGENT", Field::NominatimUserAgent),
    ("CSV2POINTS_LAT_KEYWORDS", Field::LatKeywords),
    ("CSV2POINTS_LON_KEYWORDS", Field::LonKeywords),
    ("CSV2POINTS_ADDR_KEYWORDS", Field::AddrKeywords),
];

#[derive(Debug, Clone, Copy)]
enum Field {
    Provider,
    GoogleApiKey,
    MapboxToken,
    OpenCageKey,
    HereApiKey,
    YahooJpAppId,
    NominatimUserAgent,
    LatKeywords,
    LonKeywords,
    AddrKeywords,
}

/// Réglages de l'outil
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Identifiant du fournisseur (`nominatim`, `google`, ...)
    pub provider: String,

    pub google_api_key: String,
    pub mapbox_token: String,
    pub opencage_key: String,
    pub here_apikey: String,
    pub yahoojp_appid: String,

    /// User-Agent envoyé à Nominatim
    pub nominatim_user_agent: String,

    /// Mots-clés personnalisés, séparés par des virgules
    pub lat_keywords: String,
    pub lon_keywords: String,
    pub addr_keywords: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Nominatim.id().to_string(),
            google_api_key: String::new(),
            mapbox_token: String::new(),
            opencage_key: String::new(),
            here_apikey: String::new(),
            yahoojp_appid: String::new(),
            nominatim_user_agent: DEFAULT_USER_AGENT.to_string(),
            lat_keywords: String::new(),
            lon_keywords: String::new(),
            addr_keywords: String::new(),
        }
    }
}

impl Settings {
    /// Charge les réglages depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse settings JSON")
    }

    /// Fichier si fourni, défauts sinon, puis surcharges d'environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Enregistre les réglages en JSON indenté
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .context(format!("Failed to write settings file: {}", path.display()))
    }

    /// Applique les surcharges; une valeur vide est ignorée
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (name, field) in ENV_OVERRIDES {
            let Some(value) = lookup(name) else { continue };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            debug!(variable = name, "Settings override from environment");
            *self.slot(*field) = value.to_string();
        }
    }

    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Provider => &mut self.provider,
            Field::GoogleApiKey => &mut self.google_api_key,
            Field::MapboxToken => &mut self.mapbox_token,
            Field::OpenCageKey => &mut self.opencage_key,
            Field::HereApiKey => &mut self.here_apikey,
            Field::YahooJpAppId => &mut self.yahoojp_appid,
            Field::NominatimUserAgent => &mut self.nominatim_user_agent,
            Field::LatKeywords => &mut self.lat_keywords,
            Field::LonKeywords => &mut self.lon_keywords,
            Field::AddrKeywords => &mut self.addr_keywords,
        }
    }

    /// Fournisseur configuré
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        self.provider
            .parse::<ProviderKind>()
            .map_err(anyhow::Error::msg)
    }

    /// Identifiant transmis au géocodeur (User-Agent pour Nominatim)
    pub fn credential(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Nominatim => &self.nominatim_user_agent,
            ProviderKind::Google => &self.google_api_key,
            ProviderKind::Mapbox => &self.mapbox_token,
            ProviderKind::OpenCage => &self.opencage_key,
            ProviderKind::YahooJp => &self.yahoojp_appid,
            ProviderKind::Here => &self.here_apikey,
        }
    }

    /// Mots-clés personnalisés pour la détection de champs
    pub fn keywords(&self) -> KeywordConfig {
        KeywordConfig {
            lat: KeywordConfig::parse_list(&self.lat_keywords),
            lon: KeywordConfig::parse_list(&self.lon_keywords),
            addr: KeywordConfig::parse_list(&self.addr_keywords),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.provider_kind().unwrap(), ProviderKind::Nominatim);
        assert_eq!(
            settings.credential(ProviderKind::Nominatim),
            DEFAULT_USER_AGENT
        );
        assert_eq!(settings.credential(ProviderKind::Google), "");
        assert_eq!(settings.keywords(), KeywordConfig::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"provider": "google", "google_api_key": "K"}"#).unwrap();
        assert_eq!(settings.provider_kind().unwrap(), ProviderKind::Google);
        assert_eq!(settings.credential(ProviderKind::Google), "K");
        assert_eq!(settings.nominatim_user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_overrides_ignore_empty_values() {
        let env: HashMap<&str, &str> = [
            ("CSV2POINTS_PROVIDER", "yahoojp"),
            ("YAHOOJP_APPID", " APPID "),
            ("GOOGLE_API_KEY", ""),
            ("CSV2POINTS_LAT_KEYWORDS", "nord, ,北緯"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings {
            google_api_key: "kept".to_string(),
            ..Settings::default()
        };
        settings.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.provider_kind().unwrap(), ProviderKind::YahooJp);
        assert_eq!(settings.credential(ProviderKind::YahooJp), "APPID");
        assert_eq!(settings.google_api_key, "kept");
        assert_eq!(settings.keywords().lat, vec!["nord", "北緯"]);
        assert!(settings.keywords().lon.is_empty());
    }

    #[test]
    fn test_unknown_provider() {
        let settings = Settings {
            provider: "bing".to_string(),
            ..Settings::default()
        };
        let err = settings.provider_kind().unwrap_err().to_string();
        assert!(err.contains("Unknown provider: bing"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("csv2points_settings_test.json");
        let settings = Settings {
            provider: "here".to_string(),
            here_apikey: "H".to_string(),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);
    }
}
