//! Détection des colonnes latitude / longitude / adresse
//!
//! Chaque nom de colonne est normalisé (trim, minuscules, sans espaces ni `_`)
//! puis comparé aux mots-clés de chaque catégorie:
//!
//! | Correspondance                          | Score |
//! |-----------------------------------------|-------|
//! | égalité                                 | 100   |
//! | mot-clé contenu dans le nom             | 70    |
//! | nom commençant/finissant par un mot-clé | 60    |
//!
//! Les colonnes à 0 sont exclues. Les listes sont triées par score décroissant,
//! l'ordre de l'en-tête départage les égalités.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

/// Mots-clés intégrés, toujours actifs
pub const LAT_KEYWORDS: &[&str] = &["lat", "latitude", "y", "fy"];
pub const LON_KEYWORDS: &[&str] = &["lon", "lng", "long", "longitude", "x", "fx"];
pub const ADDR_KEYWORDS: &[&str] = &["address", "addr"];

/// Mots-clés localisés utilisés tant que l'utilisateur n'a rien saisi
pub const DEFAULT_LAT_CUSTOM: &[&str] = &["緯度"];
pub const DEFAULT_LON_CUSTOM: &[&str] = &["経度"];
pub const DEFAULT_ADDR_CUSTOM: &[&str] = &["住所", "所在地"];

/// Noms typiques de paires X/Y (fX/fY, X/Y, lon/lat)
const PAIR_Y_NAMES: &[&str] = &["y", "fy", "lat", "緯度"];
const PAIR_X_NAMES: &[&str] = &["x", "fx", "lon", "lng", "経度"];

pub const SCORE_EXACT: u8 = 100;
pub const SCORE_CONTAINS: u8 = 70;
pub const SCORE_AFFIX: u8 = 60;
pub const SCORE_PAIR: u8 = 50;

/// Catégorie de colonne recherchée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Lat,
    Lon,
    Addr,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Lat, Category::Lon, Category::Addr];

    /// Mots-clés intégrés
    pub fn builtin(self) -> &'static [&'static str] {
        match self {
            Category::Lat => LAT_KEYWORDS,
            Category::Lon => LON_KEYWORDS,
            Category::Addr => ADDR_KEYWORDS,
        }
    }

    /// Mots-clés localisés par défaut
    pub fn localized_defaults(self) -> &'static [&'static str] {
        match self {
            Category::Lat => DEFAULT_LAT_CUSTOM,
            Category::Lon => DEFAULT_LON_CUSTOM,
            Category::Addr => DEFAULT_ADDR_CUSTOM,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Lat => f.write_str("lat"),
            Category::Lon => f.write_str("lon"),
            Category::Addr => f.write_str("addr"),
        }
    }
}

/// Mots-clés personnalisés persistés par l'utilisateur
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordConfig {
    pub lat: Vec<String>,
    pub lon: Vec<String>,
    pub addr: Vec<String>,
}

impl KeywordConfig {
    /// Mots-clés personnalisés d'une catégorie
    pub fn custom(&self, category: Category) -> &[String] {
        match category {
            Category::Lat => &self.lat,
            Category::Lon => &self.lon,
            Category::Addr => &self.addr,
        }
    }

    /// Parse la forme persistée `"a, b ,c"` (éléments vides ignorés)
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Normalise un nom de colonne ou un mot-clé
pub fn normalize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect()
}

/// Ensemble effectif (normalisé, dédoublonné) d'une catégorie
///
/// Intégrés d'abord, puis les mots-clés personnalisés s'il y en a, sinon les
/// défauts localisés. La première occurrence d'une forme normalisée gagne.
pub fn effective_keywords(category: Category, custom: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut push = |kw: &str| {
        let norm = normalize(kw);
        if !norm.is_empty() && !merged.contains(&norm) {
            merged.push(norm);
        }
    };

    for kw in category.builtin() {
        push(kw);
    }
    if custom.is_empty() {
        for kw in category.localized_defaults() {
            push(kw);
        }
    } else {
        for kw in custom {
            push(kw);
        }
    }
    merged
}

/// Score d'un nom de colonne contre des mots-clés normalisés
pub fn score(name: &str, keywords: &[String]) -> u8 {
    let norm = normalize(name);
    if norm.is_empty() {
        return 0;
    }
    if keywords.iter().any(|kw| norm == *kw) {
        return SCORE_EXACT;
    }
    if keywords.iter().any(|kw| norm.contains(kw.as_str())) {
        return SCORE_CONTAINS;
    }
    if keywords
        .iter()
        .any(|kw| norm.starts_with(kw.as_str()) || norm.ends_with(kw.as_str()))
    {
        return SCORE_AFFIX;
    }
    0
}

/// Colonne candidate avec son score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidate {
    pub field: String,
    pub score: u8,
}

/// Résultat de la détection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub lat_candidates: Vec<FieldCandidate>,
    pub lon_candidates: Vec<FieldCandidate>,
    pub address_candidates: Vec<FieldCandidate>,
    pub chosen_lat: Option<String>,
    pub chosen_lon: Option<String>,
    pub chosen_address: Option<String>,
}

impl Detection {
    /// Candidats d'une catégorie
    pub fn candidates(&self, category: Category) -> &[FieldCandidate] {
        match category {
            Category::Lat => &self.lat_candidates,
            Category::Lon => &self.lon_candidates,
            Category::Addr => &self.address_candidates,
        }
    }

    /// Noms des candidats d'une catégorie, dans l'ordre de classement
    pub fn candidate_names(&self, category: Category) -> Vec<&str> {
        self.candidates(category)
            .iter()
            .map(|c| c.field.as_str())
            .collect()
    }

    /// Vrai si une paire lat/lon a été trouvée
    pub fn has_lat_lon(&self) -> bool {
        self.chosen_lat.is_some() && self.chosen_lon.is_some()
    }
}

/// Détecte les colonnes lat/lon/adresse d'un en-tête
pub fn detect<S: AsRef<str>>(header: &[S], keywords: &KeywordConfig) -> Detection {
    let kw_lat = effective_keywords(Category::Lat, keywords.custom(Category::Lat));
    let kw_lon = effective_keywords(Category::Lon, keywords.custom(Category::Lon));
    let kw_addr = effective_keywords(Category::Addr, keywords.custom(Category::Addr));

    let mut lat = Vec::new();
    let mut lon = Vec::new();
    let mut addr = Vec::new();

    for field in header.iter().map(AsRef::as_ref) {
        for (kws, list) in [
            (&kw_lat, &mut lat),
            (&kw_lon, &mut lon),
            (&kw_addr, &mut addr),
        ] {
            let s = score(field, kws);
            if s > 0 {
                list.push(FieldCandidate {
                    field: field.to_string(),
                    score: s,
                });
            }
        }
    }

    if lat.is_empty() || lon.is_empty() {
        apply_pair_heuristic(header, &mut lat, &mut lon);
    }

    for list in [&mut lat, &mut lon, &mut addr] {
        // sort_by est stable: l'ordre de l'en-tête départage
        list.sort_by(|a, b| b.score.cmp(&a.score));
    }

    let detection = Detection {
        chosen_lat: lat.first().map(|c| c.field.clone()),
        chosen_lon: lon.first().map(|c| c.field.clone()),
        chosen_address: addr.first().map(|c| c.field.clone()),
        lat_candidates: lat,
        lon_candidates: lon,
        address_candidates: addr,
    };

    debug!(
        lat = ?detection.chosen_lat,
        lon = ?detection.chosen_lon,
        address = ?detection.chosen_address,
        "Header detection"
    );

    detection
}

/// Complète les candidats lat/lon quand l'en-tête contient une paire X/Y
fn apply_pair_heuristic<S: AsRef<str>>(
    header: &[S],
    lat: &mut Vec<FieldCandidate>,
    lon: &mut Vec<FieldCandidate>,
) {
    // Dernière colonne vue pour chaque nom normalisé
    let by_norm: HashMap<String, &str> = header
        .iter()
        .map(|f| (normalize(f.as_ref()), f.as_ref()))
        .collect();

    let has_x = PAIR_X_NAMES.iter().any(|k| by_norm.contains_key(*k));
    let has_y = PAIR_Y_NAMES.iter().any(|k| by_norm.contains_key(*k));
    if !(has_x && has_y) {
        return;
    }

    for (names, list) in [(PAIR_Y_NAMES, lat), (PAIR_X_NAMES, lon)] {
        for key in names {
            let Some(field) = by_norm.get(*key) else {
                continue;
            };
            if list.iter().any(|c| normalize(&c.field) == *key) {
                continue;
            }
            list.push(FieldCandidate {
                field: field.to_string(),
                score: SCORE_PAIR,
            });
        }
    }
}
