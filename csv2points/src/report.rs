//! Rapport de géocodage
//!
//! Collecte le résultat d'une passe (compteurs, échecs par adresse) pour
//! l'affichage console et l'archivage JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::geocode::ProviderKind;
use crate::task::{Completion, ScanOutcome};

/// Statut global d'une passe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeocodeStatus {
    /// Toutes les adresses localisées
    Success,
    /// Résultats appliqués, certaines adresses en échec
    PartialSuccess,
    /// Passe annulée, rien n'a été écrit
    Canceled,
    /// Application impossible ou aucune adresse localisée
    Failed,
}

/// Adresse non localisée
#[derive(Debug, Clone, Serialize)]
pub struct GeocodeFailure {
    pub feature_id: u64,
    pub address: String,
    pub message: String,
}

/// Rapport complet d'une passe
#[derive(Debug, Clone, Serialize)]
pub struct GeocodeReport {
    pub provider: ProviderKind,
    pub address_field: String,
    pub duration_secs: f64,
    pub status: GeocodeStatus,

    /// Nombre d'adresses envoyées au fournisseur
    pub processed: usize,
    pub added: usize,
    pub failed: usize,
    /// Features ignorées (géométrie déjà présente ou adresse vide)
    pub skipped: usize,
    pub applied: bool,

    /// Nombre d'échecs par message
    pub by_message: BTreeMap<String, usize>,
    pub failures: Vec<GeocodeFailure>,
}

impl GeocodeReport {
    pub fn new(provider: ProviderKind, address_field: &str) -> Self {
        Self {
            provider,
            address_field: address_field.to_string(),
            duration_secs: 0.0,
            status: GeocodeStatus::Success,
            processed: 0,
            added: 0,
            failed: 0,
            skipped: 0,
            applied: false,
            by_message: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Enregistre le balayage et son application
    ///
    /// `canceled` couvre aussi une annulation arrivée après la fin du parcours.
    pub fn record(&mut self, outcome: &ScanOutcome, completion: &Completion, canceled: bool) {
        self.processed = completion.processed;
        self.added = completion.added;
        self.failed = completion.failed;
        self.applied = completion.succeeded;

        for unlocated in &outcome.unlocated {
            *self.by_message.entry(unlocated.error.clone()).or_default() += 1;
            self.failures.push(GeocodeFailure {
                feature_id: unlocated.feature_id,
                address: unlocated.address.clone(),
                message: unlocated.error.clone(),
            });
        }

        self.status = if canceled {
            GeocodeStatus::Canceled
        } else if !completion.succeeded {
            GeocodeStatus::Failed
        } else if self.failed == 0 {
            GeocodeStatus::Success
        } else if self.added > 0 {
            GeocodeStatus::PartialSuccess
        } else {
            GeocodeStatus::Failed
        };
    }

    pub fn set_skipped(&mut self, skipped: usize) {
        self.skipped = skipped;
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!(
            "GEOCODE REPORT - {} ({})",
            self.provider.display_name(),
            self.address_field
        );
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Addresses: {} processed, {} located, {} failed, {} skipped",
            self.processed, self.added, self.failed, self.skipped
        );

        if !self.by_message.is_empty() {
            println!("\n--- BY MESSAGE ---");
            for (message, count) in &self.by_message {
                let message = if message.is_empty() { "(none)" } else { message };
                println!("  {}: {}", message, count);
            }
        }

        if !self.failures.is_empty() {
            println!("\n--- FAILURES ({}) ---", self.failures.len());
            for f in self.failures.iter().take(20) {
                println!("  [{}] {}: {}", f.feature_id, f.address, f.message);
            }
            if self.failures.len() > 20 {
                println!("  ... and {} more", self.failures.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        format!(
            "{}: {} located, {} failed, {} processed",
            self.provider, self.added, self.failed, self.processed
        )
    }
}
