//! Normalisation des réponses fournisseur vers les champs de la couche
//!
//! Deux schémas coexistent: le schéma aligné sur Google (`status`, `error`,
//! `location_type`, ...) et l'ancien schéma préfixé `_geocode_*`. Chaque
//! attribut logique liste ses noms candidats, nouveau schéma d'abord; la
//! résolution contre les champs du stockage se fait une fois par passe.
//!
//! Les attributs propres à un fournisseur dépendent de la forme de sa réponse
//! ([`ProviderShape`]), choisie une fois à partir du géocodeur configuré.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::geocode::{ProviderKind, Status};
use crate::store::AttrValue;

/// Forme de la réponse brute d'un fournisseur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderShape {
    Google,
    Nominatim,
    Mapbox,
    OpenCage,
    Here,
    YahooJp,
}

impl From<ProviderKind> for ProviderShape {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Google => ProviderShape::Google,
            ProviderKind::Nominatim => ProviderShape::Nominatim,
            ProviderKind::Mapbox => ProviderShape::Mapbox,
            ProviderKind::OpenCage => ProviderShape::OpenCage,
            ProviderKind::Here => ProviderShape::Here,
            ProviderKind::YahooJp => ProviderShape::YahooJp,
        }
    }
}

/// Origine d'une valeur dans un résultat réussi
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Clé de premier niveau du document brut
    Key(&'static str),
    /// Pointeur JSON (RFC 6901)
    Pointer(&'static str),
    /// Première clé non vide parmi plusieurs
    FirstOf(&'static [&'static str]),
    /// Tableau de chaînes joint par `|`
    JoinedTypes(&'static str),
    /// `long_name` du premier composant d'adresse portant ce type
    AddressComponent(&'static str),
    /// Texte de la première entrée `context` dont l'id a ce préfixe
    ContextPrefix(&'static str),
    /// Booléen rendu en `"true"` / `"false"`
    Flag(&'static str),
    /// Latitude retenue par le géocodeur
    Lat,
    /// Longitude retenue par le géocodeur
    Lng,
}

/// Attribut logique: noms candidats par priorité, et origine de la valeur
pub type AttributeRule = (&'static [&'static str], Source);

pub const STATUS_FIELDS: &[&str] = &["status", "_geocode_status"];
pub const ERROR_FIELDS: &[&str] = &["error", "_geocode_error"];
pub const PRECISION_FIELDS: &[&str] = &["location_type", "_geocode_precision"];

const GOOGLE_RULES: &[AttributeRule] = &[
    (
        &["formatted_address", "_geocode_formatted"],
        Source::Key("formatted_address"),
    ),
    (&["place_id", "_geocode_place_id"], Source::Key("place_id")),
    (
        &["location_type", "_geocode_location_type"],
        Source::Pointer("/geometry/location_type"),
    ),
    (&["types", "_geocode_types"], Source::JoinedTypes("types")),
    (
        &["postal_code", "_geocode_postal_code"],
        Source::AddressComponent("postal_code"),
    ),
    (&["lat"], Source::Pointer("/geometry/location/lat")),
    (&["lng"], Source::Pointer("/geometry/location/lng")),
    (&["partial_match"], Source::Flag("partial_match")),
];

const NOMINATIM_RULES: &[AttributeRule] = &[
    (&["place_id"], Source::Key("place_id")),
    (&["display_name"], Source::Key("display_name")),
    (&["place_rank"], Source::Key("place_rank")),
    (&["lat"], Source::FirstOf(&["lat", "latitude"])),
    (&["lng"], Source::FirstOf(&["lon", "longitude"])),
];

const MAPBOX_RULES: &[AttributeRule] = &[
    (&["id"], Source::Key("id")),
    (&["place_name"], Source::Key("place_name")),
    (&["postcode"], Source::ContextPrefix("postcode.")),
    (&["accuracy"], Source::Pointer("/properties/accuracy")),
    (&["lat"], Source::Lat),
    (&["lng"], Source::Lng),
];

const OPENCAGE_RULES: &[AttributeRule] = &[
    (&["formatted"], Source::Key("formatted")),
    (&["postcode"], Source::Pointer("/components/postcode")),
    (&["confidence"], Source::Key("confidence")),
    (&["lat"], Source::Lat),
    (&["lng"], Source::Lng),
];

const HERE_RULES: &[AttributeRule] = &[
    (&["id"], Source::Key("id")),
    (&["title"], Source::Key("title")),
    (&["postalCode"], Source::Pointer("/address/postalCode")),
    (&["lat"], Source::Lat),
    (&["lng"], Source::Lng),
];

const YAHOOJP_RULES: &[AttributeRule] = &[
    (&["Uid"], Source::Key("Id")),
    (&["Name"], Source::Key("Name")),
    (
        &["AddressMatchingLevel"],
        Source::Pointer("/Property/AddressMatchingLevel"),
    ),
    (&["lat"], Source::Lat),
    (&["lng"], Source::Lng),
];

impl ProviderShape {
    /// Règles propres à la forme, dans l'ordre d'écriture
    pub fn rules(self) -> &'static [AttributeRule] {
        match self {
            ProviderShape::Google => GOOGLE_RULES,
            ProviderShape::Nominatim => NOMINATIM_RULES,
            ProviderShape::Mapbox => MAPBOX_RULES,
            ProviderShape::OpenCage => OPENCAGE_RULES,
            ProviderShape::Here => HERE_RULES,
            ProviderShape::YahooJp => YAHOOJP_RULES,
        }
    }
}

/// Champs (nouveau schéma) d'une couche fraîchement géocodée
pub fn provider_fields(kind: ProviderKind) -> Vec<&'static str> {
    let mut fields = vec![STATUS_FIELDS[0], ERROR_FIELDS[0], PRECISION_FIELDS[0]];
    for (candidates, _) in ProviderShape::from(kind).rules() {
        if !fields.contains(&candidates[0]) {
            fields.push(candidates[0]);
        }
    }
    fields
}

/// Premier candidat présent parmi les champs
fn resolve_field(fields: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| fields.iter().position(|f| f == name))
}

/// Résultat réussi vu par la normalisation
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub lon: f64,
    pub lat: f64,
    pub precision: &'a str,
    pub raw: &'a Value,
}

/// Correspondances résolues pour une passe
#[derive(Debug, Clone)]
pub struct Normalizer {
    status: Option<usize>,
    error: Option<usize>,
    precision: Option<usize>,
    extras: Vec<(usize, Source)>,
}

impl Normalizer {
    /// Résout les règles contre les champs du stockage
    pub fn resolve(shape: ProviderShape, fields: &[String]) -> Self {
        let extras: Vec<(usize, Source)> = shape
            .rules()
            .iter()
            .filter_map(|(candidates, source)| {
                resolve_field(fields, candidates).map(|idx| (idx, *source))
            })
            .collect();

        let normalizer = Self {
            status: resolve_field(fields, STATUS_FIELDS),
            error: resolve_field(fields, ERROR_FIELDS),
            precision: resolve_field(fields, PRECISION_FIELDS),
            extras,
        };
        debug!(
            shape = ?shape,
            status = ?normalizer.status,
            error = ?normalizer.error,
            extras = normalizer.extras.len(),
            "Result fields resolved"
        );
        normalizer
    }

    /// Vrai si aucun champ de résultat n'existe
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.error.is_none()
            && self.precision.is_none()
            && self.extras.is_empty()
    }

    /// Valeurs à écrire pour un succès
    ///
    /// La précision est écrite avant les attributs du fournisseur: pour Google,
    /// `geometry.location_type` remplace donc la précision dans `location_type`.
    pub fn success_changes(&self, hit: &Hit<'_>) -> HashMap<usize, AttrValue> {
        let mut changes = HashMap::new();
        if let Some(idx) = self.status {
            changes.insert(idx, AttrValue::from(Status::Ok.as_str()));
        }
        if let Some(idx) = self.precision {
            changes.insert(idx, AttrValue::from(hit.precision));
        }
        for (idx, source) in &self.extras {
            if let Some(value) = extract(*source, hit) {
                changes.insert(*idx, value);
            }
        }
        changes
    }

    /// Valeurs à écrire pour un échec
    pub fn failure_changes(&self, error: &str) -> HashMap<usize, AttrValue> {
        let mut changes = HashMap::new();
        if let Some(idx) = self.status {
            changes.insert(idx, AttrValue::from(Status::Fail.as_str()));
        }
        if let Some(idx) = self.error {
            changes.insert(idx, AttrValue::from(error));
        }
        changes
    }
}

/// Valeur absente ou nulle -> texte vide
fn or_empty(value: Option<&Value>) -> AttrValue {
    match value {
        None | Some(Value::Null) => AttrValue::from(""),
        Some(v) => AttrValue::from_json(v),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// `None` quand la forme du document ne permet pas d'écrire le champ
fn extract(source: Source, hit: &Hit<'_>) -> Option<AttrValue> {
    let raw = hit.raw;
    let value = match source {
        Source::Key(key) => or_empty(raw.get(key)),
        Source::Pointer(pointer) => or_empty(raw.pointer(pointer)),
        Source::FirstOf(keys) => or_empty(
            keys.iter()
                .filter_map(|k| raw.get(*k))
                .find(|v| !is_blank(v)),
        ),
        Source::JoinedTypes(key) => match raw.get(key) {
            None | Some(Value::Null) => AttrValue::from(""),
            Some(Value::Array(items)) => AttrValue::from(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            Some(_) => return None,
        },
        Source::AddressComponent(kind) => {
            let components = match raw.get("address_components") {
                None | Some(Value::Null) => return Some(AttrValue::from("")),
                Some(Value::Array(items)) => items,
                Some(_) => return None,
            };
            let name = components
                .iter()
                .find(|c| {
                    c.get("types")
                        .and_then(Value::as_array)
                        .is_some_and(|types| types.iter().any(|t| t.as_str() == Some(kind)))
                })
                .and_then(|c| c.get("long_name"));
            or_empty(name)
        }
        Source::ContextPrefix(prefix) => {
            let text = raw
                .get("context")
                .and_then(Value::as_array)
                .and_then(|ctx| {
                    ctx.iter().find(|c| {
                        c.get("id")
                            .and_then(Value::as_str)
                            .is_some_and(|id| id.starts_with(prefix))
                    })
                })
                .and_then(|c| c.get("text"));
            or_empty(text)
        }
        Source::Flag(key) => {
            let truthy = match raw.get(key) {
                Some(Value::Bool(b)) => *b,
                Some(v) => !is_blank(v),
                None => false,
            };
            AttrValue::from(if truthy { "true" } else { "false" })
        }
        Source::Lat => AttrValue::Real(hit.lat),
        Source::Lng => AttrValue::Real(hit.lon),
    };
    Some(value)
}
