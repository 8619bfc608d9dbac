//! Parser de coordonnées (degrés décimaux, DMS, unités japonaises)
//!
//! Formes acceptées, par exemple:
//! - `35.658083`, `-139.7`
//! - `35°39'29.1"N`, `139°42'30"E`, `35 39'29.1"`
//! - `35度39分29.1秒N`
//!
//! Les caractères pleine chasse (`３５．６`, `－`, `Ｎ`, espace idéographique)
//! sont ramenés à l'ASCII avant l'analyse.
//!
//! Une lettre d'hémisphère (N/S/E/W, insensible à la casse) l'emporte toujours
//! sur le signe porté par les degrés.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::Axis;
use crate::CsvGeoError;

/// Grammaire DMS: degrés signés, minutes (après °/º/度/espace), secondes
/// (après '/’/′/分), marque de secondes optionnelle ("/”/″/秒), hémisphère.
const DMS_PATTERN: &str = r#"^\s*(?P<deg>[-+]?[0-9]+(?:\.[0-9]+)?)(?:[°º度\s]\s*(?P<min>[0-9]+(?:\.[0-9]+)?))?(?:['’′分]\s*(?P<sec>[0-9]+(?:\.[0-9]+)?))?(?:["”″秒])?\s*(?P<hem>[NnSsEeWw])?\s*$"#;

fn dms_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DMS_PATTERN).expect("DMS pattern is a valid regex"))
}

/// Hémisphère explicite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Self::North),
            'S' => Some(Self::South),
            'E' => Some(Self::East),
            'W' => Some(Self::West),
            _ => None,
        }
    }

    /// Vrai pour S et W
    pub fn is_negative(self) -> bool {
        matches!(self, Self::South | Self::West)
    }
}

/// Coordonnée décomposée, avant application du signe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedCoordinate {
    /// |degrés| + minutes/60 + secondes/3600
    pub magnitude: f64,

    /// Signe porté par la valeur des degrés
    pub negative: bool,

    /// Lettre d'hémisphère, si présente
    pub hemisphere: Option<Hemisphere>,
}

impl ParsedCoordinate {
    /// Valeur signée en degrés décimaux
    pub fn value(&self) -> f64 {
        let negative = match self.hemisphere {
            Some(h) => h.is_negative(),
            None => self.negative,
        };
        if negative {
            -self.magnitude
        } else {
            self.magnitude
        }
    }
}

/// Ramène les formes pleine chasse (U+FF01..U+FF5E, U+3000) à l'ASCII
pub fn fold_fullwidth(text: &str) -> Cow<'_, str> {
    fn is_fullwidth(c: char) -> bool {
        matches!(c, '\u{FF01}'..='\u{FF5E}' | '\u{3000}')
    }

    if !text.chars().any(is_fullwidth) {
        return Cow::Borrowed(text);
    }
    text.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            c if is_fullwidth(c) => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            c => c,
        })
        .collect::<String>()
        .into()
}

/// Décompose un texte de coordonnée sans appliquer de bornes
pub fn parse_components(text: &str) -> Result<ParsedCoordinate, CsvGeoError> {
    let folded = fold_fullwidth(text);
    let Some(caps) = dms_regex().captures(&folded) else {
        // Repli: simple flottant
        let value = parse_number(folded.trim()).ok_or_else(|| CsvGeoError::coordinate(text))?;
        return Ok(ParsedCoordinate {
            magnitude: value.abs(),
            negative: value.is_sign_negative(),
            hemisphere: None,
        });
    };

    let deg_text = &caps["deg"];
    let deg = parse_number(deg_text).ok_or_else(|| CsvGeoError::coordinate(text))?;
    let mut magnitude = deg.abs();

    if let Some(min) = caps.name("min") {
        magnitude += parse_number(min.as_str()).ok_or_else(|| CsvGeoError::coordinate(text))? / 60.0;
    }
    if let Some(sec) = caps.name("sec") {
        magnitude +=
            parse_number(sec.as_str()).ok_or_else(|| CsvGeoError::coordinate(text))? / 3600.0;
    }

    let hemisphere = caps
        .name("hem")
        .and_then(|m| m.as_str().chars().next())
        .and_then(Hemisphere::from_char);

    Ok(ParsedCoordinate {
        magnitude,
        // Le signe textuel couvre aussi -0°30'0"
        negative: deg_text.starts_with('-'),
        hemisphere,
    })
}

/// Convertit un texte de coordonnée en degrés décimaux signés
pub fn parse_dms(text: &str) -> Result<f64, CsvGeoError> {
    parse_components(text).map(|c| c.value())
}

/// Parse une latitude et vérifie qu'elle est dans [-90, 90]
pub fn parse_lat(text: &str) -> Result<f64, CsvGeoError> {
    parse_axis(text, Axis::Latitude)
}

/// Parse une longitude et vérifie qu'elle est dans [-180, 180]
pub fn parse_lon(text: &str) -> Result<f64, CsvGeoError> {
    parse_axis(text, Axis::Longitude)
}

/// Parse une coordonnée pour un axe donné
pub fn parse_axis(text: &str, axis: Axis) -> Result<f64, CsvGeoError> {
    let value = parse_dms(text)?;
    if !(-axis.limit()..=axis.limit()).contains(&value) {
        return Err(CsvGeoError::OutOfRange { axis, value });
    }
    Ok(value)
}

/// Formate des degrés décimaux en DMS (`35°39'29.1000"N`)
///
/// Le résultat est relu à l'identique (à 1e-6 près) par [`parse_dms`].
pub fn format_dms(value: f64, axis: Axis) -> String {
    let (positive, negative) = axis.hemispheres();
    let hemisphere = if value < 0.0 { negative } else { positive };

    let abs = value.abs();
    let mut degrees = abs.trunc();
    let mut minutes = ((abs - degrees) * 60.0).trunc();
    let mut seconds = ((abs - degrees - minutes / 60.0) * 3600.0 * 10_000.0).round() / 10_000.0;

    // Report des arrondis (59.99995" -> 60")
    if seconds >= 60.0 {
        seconds -= 60.0;
        minutes += 1.0;
    }
    if minutes >= 60.0 {
        minutes -= 60.0;
        degrees += 1.0;
    }

    format!(
        "{}°{}'{:.4}\"{}",
        degrees as u32, minutes as u32, seconds, hemisphere
    )
}

/// Parse un nombre fini (fast-float)
fn parse_number(s: &str) -> Option<f64> {
    let unsigned = s
        .strip_prefix('+')
        .filter(|rest| !rest.starts_with(['+', '-']))
        .unwrap_or(s);
    fast_float::parse::<f64, _>(unsigned)
        .ok()
        .filter(|v| v.is_finite())
}
