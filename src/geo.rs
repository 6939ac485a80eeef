//! Geographic distance and scoring
//!
//! City resolution is a two-step: a built-in static table of the French cities
//! seen in the catalog, then an optional caller-provided [`Geocoder`]. Geocoder
//! results (hits and misses both) land in a process-wide cache so a city is
//! resolved at most once per process.

use crate::error::{MatchError, Result};
use crate::text::normalize;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// How strongly physical distance depresses the score for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GeoImpact {
    /// Online service, distance irrelevant
    Online,
    /// Local service, moderate decay
    Local,
    /// On-site or emergency service, sharp decay
    OnSite,
}

impl GeoImpact {
    /// Exponential decay coefficient for the geo score.
    pub fn alpha(self) -> f64 {
        match self {
            GeoImpact::Online => 0.0,
            GeoImpact::Local => 0.015,
            GeoImpact::OnSite => 0.05,
        }
    }

    /// Semantic/geo blend weights for this impact level.
    pub fn blend_weights(self) -> (f32, f32) {
        match self {
            GeoImpact::Online => (1.0, 0.0),
            GeoImpact::Local => (0.65, 0.35),
            GeoImpact::OnSite => (0.45, 0.55),
        }
    }
}

impl TryFrom<u8> for GeoImpact {
    type Error = MatchError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(GeoImpact::Online),
            1 => Ok(GeoImpact::Local),
            2 => Ok(GeoImpact::OnSite),
            other => Err(MatchError::Validation {
                message: format!("impact_geo must be 0, 1 or 2 (got {})", other),
            }),
        }
    }
}

impl From<GeoImpact> for u8 {
    fn from(value: GeoImpact) -> u8 {
        match value {
            GeoImpact::Online => 0,
            GeoImpact::Local => 1,
            GeoImpact::OnSite => 2,
        }
    }
}

/// External geocoding seam. Implementations must be side-effect-safe: the
/// resolver caches every answer, including `None`, for the process lifetime.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, city: &str) -> Option<(f64, f64)>;
}

/// (latitude, longitude) for the main French cities present in the catalog.
static CITY_COORDS: &[(&str, f64, f64)] = &[
    ("Paris", 48.8566, 2.3522),
    ("Lyon", 45.7640, 4.8357),
    ("Marseille", 43.2965, 5.3698),
    ("Toulouse", 43.6047, 1.4442),
    ("Lille", 50.6292, 3.0573),
    ("Bordeaux", 44.8378, -0.5792),
    ("Nice", 43.7102, 7.2620),
    ("Nantes", 47.2184, -1.5536),
    ("Strasbourg", 48.5734, 7.7521),
    ("Montpellier", 43.6108, 3.8767),
    ("Rennes", 48.1173, -1.6778),
    ("Toulon", 43.1242, 5.9280),
    ("Grenoble", 45.1885, 5.7245),
    ("Dijon", 47.3220, 5.0415),
    ("Angers", 47.4784, -0.5632),
    ("Brest", 48.3905, -4.4860),
    ("Le Mans", 48.0077, 0.1984),
    ("Metz", 49.1193, 6.1757),
    ("Reims", 49.2583, 4.0317),
    ("Orléans", 47.9029, 1.9093),
    ("Bourges", 47.0816, 2.3987),
    // Approximation: La Roche-sur-Yon
    ("Vendée", 46.6706, -1.4269),
    ("Versailles", 48.8049, 2.1204),
    ("Rouen", 49.4432, 1.0993),
    ("Mulhouse", 47.7508, 7.3359),
    ("Caen", 49.1829, -0.3707),
    ("Nancy", 48.6921, 6.1844),
    ("Saint-Étienne", 45.4397, 4.3872),
    ("Avignon", 43.9493, 4.8055),
];

/// Normalized city name -> coordinates, built once from the static table.
static CITY_INDEX: Lazy<HashMap<String, (f64, f64)>> = Lazy::new(|| {
    CITY_COORDS
        .iter()
        .map(|(name, lat, lon)| (normalize(name), (*lat, *lon)))
        .collect()
});

/// Process-wide geocoder cache keyed by normalized city name.
/// Entries never expire; negative lookups are cached too.
static GEOCODE_CACHE: Lazy<Mutex<HashMap<String, Option<(f64, f64)>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Known city names in canonical capitalization, in table order.
pub fn known_cities() -> impl Iterator<Item = &'static str> {
    CITY_COORDS.iter().map(|(name, _, _)| *name)
}

/// Canonical capitalization for a known city, compared accent- and
/// case-insensitively. Returns `None` for cities outside the static table.
pub fn canonical_city(city: &str) -> Option<&'static str> {
    let needle = normalize(city);
    CITY_COORDS
        .iter()
        .find(|(name, _, _)| normalize(name) == needle)
        .map(|(name, _, _)| *name)
}

/// Great-circle distance in km between two GPS points (Haversine).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Resolves cities to coordinates and distances, with an optional external
/// geocoder behind the static table.
#[derive(Clone, Default)]
pub struct GeoResolver {
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl GeoResolver {
    pub fn new(geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self { geocoder }
    }

    /// City -> coordinates: static table first, then cached geocoder lookup.
    pub fn resolve(&self, city: &str) -> Option<(f64, f64)> {
        let key = normalize(city);
        if key.is_empty() {
            return None;
        }
        if let Some(coords) = CITY_INDEX.get(&key) {
            return Some(*coords);
        }
        let geocoder = self.geocoder.as_ref()?;

        if let Some(cached) = GEOCODE_CACHE
            .lock()
            .expect("geocode cache poisoned")
            .get(&key)
        {
            return *cached;
        }
        let coords = geocoder.geocode(city);
        debug!(city = %city, found = coords.is_some(), "geocoder lookup");
        GEOCODE_CACHE
            .lock()
            .expect("geocode cache poisoned")
            .insert(key, coords);
        coords
    }

    /// Great-circle distance in km between two cities, `None` when either
    /// city cannot be resolved.
    pub fn distance_km(&self, city_a: &str, city_b: &str) -> Option<f64> {
        let (lat1, lon1) = self.resolve(city_a)?;
        let (lat2, lon2) = self.resolve(city_b)?;
        Some(haversine_km(lat1, lon1, lat2, lon2))
    }

    /// Geographic score in [0, 1].
    ///
    /// `exp(-alpha * distance_km)` with alpha set by the impact level, and
    /// fixed fallbacks for the degenerate cases: online service 1.0, no
    /// request city 0.8, same city 1.0, unresolvable distance 0.7. Bounded by
    /// construction, no post-hoc normalization.
    pub fn geo_score(
        &self,
        city_need: Option<&str>,
        city_provider: &str,
        impact: GeoImpact,
    ) -> f32 {
        if impact == GeoImpact::Online {
            return 1.0;
        }
        let Some(need) = city_need.filter(|c| !normalize(c).is_empty()) else {
            return 0.8;
        };
        if normalize(need) == normalize(city_provider) {
            return 1.0;
        }
        match self.distance_km(need, city_provider) {
            Some(distance) => (-impact.alpha() * distance).exp() as f32,
            None => 0.7,
        }
    }
}
