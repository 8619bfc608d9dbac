//! Stockage des features: champs nommés, géométrie ponctuelle optionnelle,
//! écritures en masse

use std::collections::HashMap;
use std::fmt;

use geo::{BoundingRect, MultiPoint, Point, Rect};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use csvgeo::PointRow;

/// Identifiant de feature (attribué à partir de 1)
pub type FeatureId = u64;

/// Modifications de géométrie, par feature
pub type GeometryChanges = HashMap<FeatureId, Point<f64>>;

/// Modifications d'attributs, par feature puis par index de champ
pub type AttributeChanges = HashMap<FeatureId, HashMap<usize, AttrValue>>;

/// Nom du champ portant l'erreur de parsing des coordonnées
pub const PARSE_ERROR_FIELD: &str = "_parse_error";

/// Erreurs du stockage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown feature id: {0}")]
    UnknownFeature(FeatureId),

    #[error("Field index {index} out of range for feature {feature_id}")]
    FieldOutOfRange { feature_id: FeatureId, index: usize },

    #[error("Field not found: {0}")]
    MissingField(String),
}

/// Valeur d'attribut
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttrValue {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl AttrValue {
    /// Convertit une valeur JSON issue d'un fournisseur
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttrValue::Null,
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Bool(b) => AttrValue::Text(b.to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Integer(i),
                None => n.as_f64().map_or(AttrValue::Null, AttrValue::Real),
            },
            other => AttrValue::Text(other.to_string()),
        }
    }

    /// Valeur JSON pour l'export
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Text(s) => Value::String(s.clone()),
            AttrValue::Integer(i) => Value::from(*i),
            AttrValue::Real(r) => Value::from(*r),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => Ok(()),
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Integer(i) => write!(f, "{}", i),
            AttrValue::Real(r) => write!(f, "{}", r),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Real(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Integer(v)
    }
}

/// Une feature du stockage
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Option<Point<f64>>,
    /// Une valeur par champ, dans l'ordre des champs
    pub attributes: Vec<AttrValue>,
}

impl Feature {
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}

/// Collaborateur de stockage des passes de géocodage
pub trait FeatureStore {
    /// Noms des champs, dans l'ordre
    fn fields(&self) -> &[String];

    /// Index d'un champ par nom exact (première occurrence)
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f == name)
    }

    fn feature_count(&self) -> usize;

    fn features(&self) -> Box<dyn Iterator<Item = &Feature> + '_>;

    /// Remplace les géométries en une seule opération
    fn change_geometry_values(&mut self, changes: &GeometryChanges) -> Result<(), StoreError>;

    /// Remplace des valeurs d'attributs en une seule opération
    fn change_attribute_values(&mut self, changes: &AttributeChanges) -> Result<(), StoreError>;
}

/// Stockage en mémoire (EPSG:4326)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    fields: Vec<String>,
    features: Vec<Feature>,
    positions: HashMap<FeatureId, usize>,
    next_id: FeatureId,
}

impl MemoryStore {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            features: Vec::new(),
            positions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Couche de points: colonnes CSV puis `_parse_error`
    pub fn from_point_rows(header: &[String], rows: &[PointRow]) -> Self {
        let mut fields = header.to_vec();
        fields.push(PARSE_ERROR_FIELD.to_string());

        let mut store = Self::new(fields);
        for row in rows {
            let mut attributes: Vec<AttrValue> =
                row.values.iter().map(|v| AttrValue::from(v.as_str())).collect();
            attributes.resize(header.len(), AttrValue::Text(String::new()));
            attributes.push(
                row.parse_error
                    .as_deref()
                    .map_or(AttrValue::Null, AttrValue::from),
            );
            store.add_feature(row.point, attributes);
        }
        store
    }

    /// Couche à géocoder: colonnes CSV puis champs de résultat absents de l'en-tête
    pub fn from_table(header: &[String], rows: &[Vec<String>], extra_fields: &[&str]) -> Self {
        let mut fields = header.to_vec();
        for name in extra_fields {
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        }

        let mut store = Self::new(fields);
        for row in rows {
            let attributes = row.iter().map(|v| AttrValue::from(v.as_str())).collect();
            store.add_feature(None, attributes);
        }
        store
    }

    /// Ajoute une feature, attributs complétés par Null ou tronqués
    pub fn add_feature(
        &mut self,
        geometry: Option<Point<f64>>,
        mut attributes: Vec<AttrValue>,
    ) -> FeatureId {
        attributes.resize(self.fields.len(), AttrValue::Null);
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.positions.insert(id, self.features.len());
        self.features.push(Feature {
            id,
            geometry,
            attributes,
        });
        id
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.positions.get(&id).map(|&pos| &self.features[pos])
    }

    /// Valeur d'un attribut par nom de champ
    pub fn attribute(&self, id: FeatureId, field: &str) -> Option<&AttrValue> {
        let index = self.field_index(field)?;
        self.get(id)?.attributes.get(index)
    }

    /// Emprise des géométries présentes
    pub fn extent(&self) -> Option<Rect<f64>> {
        let points: MultiPoint<f64> = self
            .features
            .iter()
            .filter_map(|f| f.geometry)
            .collect::<Vec<_>>()
            .into();
        points.bounding_rect()
    }

    fn position(&self, id: FeatureId) -> Result<usize, StoreError> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(StoreError::UnknownFeature(id))
    }
}

impl FeatureStore for MemoryStore {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn features(&self) -> Box<dyn Iterator<Item = &Feature> + '_> {
        Box::new(self.features.iter())
    }

    fn change_geometry_values(&mut self, changes: &GeometryChanges) -> Result<(), StoreError> {
        // Validation complète avant toute mutation
        let targets = changes
            .iter()
            .map(|(id, point)| Ok((self.position(*id)?, *point)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        for (pos, point) in targets {
            self.features[pos].geometry = Some(point);
        }
        debug!(count = changes.len(), "Geometries updated");
        Ok(())
    }

    fn change_attribute_values(&mut self, changes: &AttributeChanges) -> Result<(), StoreError> {
        let width = self.fields.len();
        let mut targets = Vec::with_capacity(changes.len());
        for (id, values) in changes {
            let pos = self.position(*id)?;
            if let Some(&index) = values.keys().find(|&&index| index >= width) {
                return Err(StoreError::FieldOutOfRange {
                    feature_id: *id,
                    index,
                });
            }
            targets.push((pos, values));
        }

        for (pos, values) in targets {
            for (&index, value) in values {
                self.features[pos].attributes[index] = value.clone();
            }
        }
        debug!(count = changes.len(), "Attributes updated");
        Ok(())
    }
}
