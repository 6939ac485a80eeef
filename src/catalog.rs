//! Provider catalog and tabular ingestion
//!
//! Providers are loaded once, cleaned up, and stay immutable afterwards. The
//! CSV layer speaks the catalog's French column names; the rest of the engine
//! only sees the typed [`Provider`] rows.

use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::info;

/// One catalog entry describing an offered service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    /// Comma-separated domain tokens, e.g. "plomberie, travaux, urgence"
    pub expertise: String,
    /// Free text with conventions like "24/7", "urgence", "semaine"
    pub availability: String,
    pub description: String,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderRecord {
    id: String,
    #[serde(rename = "Nom_Entreprise")]
    name: String,
    #[serde(rename = "Domaines_Expertise")]
    expertise: String,
    #[serde(rename = "Disponibilite")]
    availability: String,
    #[serde(rename = "Description_Service")]
    description: String,
    #[serde(rename = "Ville", default)]
    city: Option<String>,
}

/// One row of the needs table used by batch runs.
#[derive(Debug, Clone, Deserialize)]
pub struct NeedRecord {
    #[serde(rename = "Message_Utilisateur", default)]
    pub message: String,
    #[serde(rename = "Categorie_Majeure", default)]
    pub category: Option<String>,
    #[serde(rename = "Sous_Categorie", default)]
    pub sub_category: Option<String>,
    #[serde(rename = "Niveau_Urgence", default)]
    pub urgency: Option<String>,
    #[serde(rename = "Ville_Detectee", default)]
    pub city: Option<String>,
    #[serde(rename = "Impact_Geo", default)]
    pub impact_geo: Option<u8>,
}

/// Immutable provider catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    providers: Vec<Provider>,
}

impl Catalog {
    /// Build a catalog from already-typed providers. Fails on an empty list.
    pub fn new(providers: Vec<Provider>) -> Result<Self> {
        if providers.is_empty() {
            return Err(MatchError::Catalog {
                message: "provider catalog is empty".into(),
            });
        }
        let providers = providers.into_iter().map(clean_provider).collect();
        Ok(Self { providers })
    }

    /// Load the provider table from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| MatchError::Catalog {
            message: format!("cannot open {}: {}", path.display(), e),
        })?;
        let catalog = Self::from_csv_reader(file)?;
        info!("{} providers loaded from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Load the provider table from any CSV reader.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut providers = Vec::new();
        for record in csv_reader.deserialize::<ProviderRecord>() {
            let record = record?;
            providers.push(Provider {
                id: record.id,
                name: record.name,
                expertise: record.expertise,
                availability: record.availability,
                description: record.description,
                city: record.city,
            });
        }
        Self::new(providers)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn get(&self, index: usize) -> Option<&Provider> {
        self.providers.get(index)
    }

    /// Whether geo scoring has anything to work with.
    pub fn has_cities(&self) -> bool {
        self.providers.iter().any(|p| p.city.is_some())
    }
}

/// Trim whitespace everywhere and turn blank cities into `None`.
fn clean_provider(mut p: Provider) -> Provider {
    p.id = p.id.trim().to_string();
    p.name = p.name.trim().to_string();
    p.expertise = p.expertise.trim().to_string();
    p.availability = p.availability.trim().to_string();
    p.description = p.description.trim().to_string();
    p.city = p
        .city
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    p
}

/// Load the needs table from a CSV file.
pub fn needs_from_csv_path(path: impl AsRef<Path>) -> Result<Vec<NeedRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| MatchError::Catalog {
        message: format!("cannot open {}: {}", path.display(), e),
    })?;
    let mut csv_reader = csv::Reader::from_reader(file);
    let mut needs = Vec::new();
    for record in csv_reader.deserialize::<NeedRecord>() {
        needs.push(record?);
    }
    info!("{} needs loaded from {}", needs.len(), path.display());
    Ok(needs)
}
