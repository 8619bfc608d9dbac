//! Passe de géocodage en masse
//!
//! Déroulement: collecte des requêtes (features sans géométrie, adresse non
//! vide), balayage bloquant par un worker, puis application unique sur le
//! stockage: au plus un appel `change_geometry_values` et un appel
//! `change_attribute_values` par passe. Une passe annulée n'écrit rien.

pub mod normalize;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use geo::Point;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::geocode::{GeocodeResult, Geocoder, Status};
use crate::store::{AttributeChanges, FeatureId, FeatureStore, GeometryChanges, StoreError};

pub use normalize::{provider_fields, Hit, Normalizer, ProviderShape};

/// Erreur enregistrée quand un succès n'a pas de coordonnées
pub const CAST_ERROR: &str = "cast error";

/// Jeton d'annulation partagé entre le thread principal et le worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Une adresse à géocoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeRequest {
    pub feature_id: FeatureId,
    pub address: String,
}

/// Succès collecté pendant le balayage
#[derive(Debug, Clone)]
pub struct Located {
    pub feature_id: FeatureId,
    pub lon: f64,
    pub lat: f64,
    pub precision: String,
    pub raw: Value,
}

/// Échec collecté pendant le balayage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlocated {
    pub feature_id: FeatureId,
    pub address: String,
    pub error: String,
}

/// Résultat du balayage, avant application
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub located: Vec<Located>,
    pub unlocated: Vec<Unlocated>,
    pub processed: usize,
    pub canceled: bool,
}

impl ScanOutcome {
    pub fn added(&self) -> usize {
        self.located.len()
    }

    pub fn failed(&self) -> usize {
        self.unlocated.len()
    }
}

/// Signal de fin de passe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    pub succeeded: bool,
    pub added: usize,
    pub failed: usize,
    pub processed: usize,
}

/// Liste les features à géocoder
pub fn collect_requests(
    store: &dyn FeatureStore,
    address_field: &str,
) -> Result<Vec<GeocodeRequest>, StoreError> {
    let index = store
        .field_index(address_field)
        .ok_or_else(|| StoreError::MissingField(address_field.to_string()))?;

    let requests: Vec<GeocodeRequest> = store
        .features()
        .filter(|f| !f.has_geometry())
        .filter_map(|f| {
            let address = f.attributes.get(index)?.to_string();
            let address = address.trim();
            (!address.is_empty()).then(|| GeocodeRequest {
                feature_id: f.id,
                address: address.to_string(),
            })
        })
        .collect();

    debug!(
        total = store.feature_count(),
        requests = requests.len(),
        "Geocode requests collected"
    );
    Ok(requests)
}

/// Balaye les requêtes avec un géocodeur (bloquant)
///
/// L'annulation est vérifiée avant chaque ligne. `progress` reçoit un
/// pourcentage après chaque ligne traitée.
pub fn scan(
    geocoder: &mut dyn Geocoder,
    requests: &[GeocodeRequest],
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f64),
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let total = requests.len().max(1) as f64;

    for (i, request) in requests.iter().enumerate() {
        if cancel.is_canceled() {
            break;
        }

        let result = geocoder.geocode(&request.address);
        record(&mut outcome, request, result);
        outcome.processed += 1;
        progress(((i + 1) as f64 / total * 100.0).min(100.0));
    }

    outcome.canceled = cancel.is_canceled();
    if outcome.canceled {
        warn!(processed = outcome.processed, "Geocoding canceled");
    }
    outcome
}

fn record(outcome: &mut ScanOutcome, request: &GeocodeRequest, result: GeocodeResult) {
    match (result.status, result.lon, result.lat) {
        (Status::Ok, Some(lon), Some(lat)) => outcome.located.push(Located {
            feature_id: request.feature_id,
            lon,
            lat,
            precision: result.precision.unwrap_or_default(),
            raw: result.raw,
        }),
        (Status::Ok, _, _) => outcome.unlocated.push(Unlocated {
            feature_id: request.feature_id,
            address: request.address.clone(),
            error: CAST_ERROR.to_string(),
        }),
        (Status::Fail, _, _) => {
            debug!(
                feature_id = request.feature_id,
                error = result.error.as_deref().unwrap_or(""),
                "Geocoding failed"
            );
            outcome.unlocated.push(Unlocated {
                feature_id: request.feature_id,
                address: request.address.clone(),
                error: result.error.unwrap_or_default(),
            })
        }
    }
}

/// Construit les deux lots de modifications d'une passe
pub fn build_changes(
    normalizer: &Normalizer,
    outcome: &ScanOutcome,
) -> (GeometryChanges, AttributeChanges) {
    let mut geometries = GeometryChanges::new();
    let mut attributes = AttributeChanges::new();

    for located in &outcome.located {
        geometries.insert(located.feature_id, Point::new(located.lon, located.lat));
        let hit = Hit {
            lon: located.lon,
            lat: located.lat,
            precision: &located.precision,
            raw: &located.raw,
        };
        let changes = normalizer.success_changes(&hit);
        if !changes.is_empty() {
            attributes.insert(located.feature_id, changes);
        }
    }

    for unlocated in &outcome.unlocated {
        let changes = normalizer.failure_changes(&unlocated.error);
        if !changes.is_empty() {
            attributes
                .entry(unlocated.feature_id)
                .or_default()
                .extend(changes);
        }
    }

    (geometries, attributes)
}

/// Applique un balayage terminé: géométries puis attributs
///
/// Chaque écriture est atomique côté stockage. Un échec des géométries
/// empêche l'écriture des attributs; un échec des attributs laisse les
/// géométries écrites.
pub fn apply(
    store: &mut dyn FeatureStore,
    shape: ProviderShape,
    outcome: &ScanOutcome,
) -> Result<(), StoreError> {
    let normalizer = Normalizer::resolve(shape, store.fields());
    if normalizer.is_empty() {
        debug!("No result fields in the layer, writing geometries only");
    }
    let (geometries, attributes) = build_changes(&normalizer, outcome);

    if !geometries.is_empty() {
        store.change_geometry_values(&geometries)?;
    }
    if !attributes.is_empty() {
        store.change_attribute_values(&attributes)?;
    }
    Ok(())
}

/// Une passe de géocodage sur un champ d'adresse
#[derive(Debug, Clone)]
pub struct GeocodePass {
    address_field: String,
    shape: ProviderShape,
    cancel: CancelToken,
}

impl GeocodePass {
    pub fn new(address_field: impl Into<String>, shape: ProviderShape) -> Self {
        Self {
            address_field: address_field.into(),
            shape,
            cancel: CancelToken::new(),
        }
    }

    pub fn address_field(&self) -> &str {
        &self.address_field
    }

    /// Jeton à partager avec le worker et le gestionnaire d'annulation
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Requêtes de la passe (lecture seule du stockage)
    pub fn prepare(&self, store: &dyn FeatureStore) -> Result<Vec<GeocodeRequest>, StoreError> {
        collect_requests(store, &self.address_field)
    }

    /// Vrai si la passe a été annulée, y compris après la fin du parcours
    pub fn was_canceled(&self, outcome: &ScanOutcome) -> bool {
        outcome.canceled || self.cancel.is_canceled()
    }

    /// Application finale et signal de fin
    pub fn finish(&self, store: &mut dyn FeatureStore, outcome: &ScanOutcome) -> Completion {
        let mut completion = Completion {
            succeeded: false,
            added: outcome.added(),
            failed: outcome.failed(),
            processed: outcome.processed,
        };

        if self.was_canceled(outcome) {
            return completion;
        }

        match apply(store, self.shape, outcome) {
            Ok(()) => {
                completion.succeeded = true;
                info!(
                    added = completion.added,
                    failed = completion.failed,
                    processed = completion.processed,
                    "Geocoding results applied"
                );
            }
            Err(e) => error!(error = %e, "Failed to apply geocoding results"),
        }
        completion
    }

    /// Passe complète sur le thread courant
    pub fn run(
        &self,
        store: &mut dyn FeatureStore,
        geocoder: &mut dyn Geocoder,
        progress: &mut dyn FnMut(f64),
        on_complete: impl FnOnce(&Completion),
    ) -> Completion {
        let completion = match self.prepare(store) {
            Ok(requests) => {
                let outcome = scan(geocoder, &requests, &self.cancel, progress);
                self.finish(store, &outcome)
            }
            Err(e) => {
                error!(error = %e, "Cannot start geocoding");
                Completion::default()
            }
        };
        on_complete(&completion);
        completion
    }
}
