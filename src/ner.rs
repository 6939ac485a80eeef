//! Rule-based entity extraction from request messages
//!
//! Extracts the city, the temporal horizon and the deduced urgency level from
//! free-text French messages, then derives the matching constraints the score
//! pipeline consumes. All pattern matching runs on normalized text
//! (lowercased, accents stripped), so the regexes below are written without
//! diacritics on purpose.

use crate::geo;
use crate::text::normalize;
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coarse time bucket for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "IMMEDIATE")]
    Immediate,
    #[serde(rename = "SHORT_TERM")]
    ShortTerm,
    #[serde(rename = "PLANNED")]
    Planned,
    #[serde(rename = "STANDARD")]
    Standard,
}

/// City matching constraint derived from the extracted entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CityConstraint {
    #[serde(rename = "STRICT")]
    Strict,
    #[serde(rename = "PREFERRED")]
    Preferred,
    #[serde(rename = "FLEXIBLE")]
    Flexible,
    #[serde(rename = "NATIONAL")]
    National,
}

/// Availability constraint derived from the urgency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityConstraint {
    #[serde(rename = "24/7")]
    TwentyFourSeven,
    #[serde(rename = "RAPIDE")]
    Rapide,
    #[serde(rename = "SEMAINE")]
    Semaine,
    #[serde(rename = "ALL")]
    All,
}

/// Matching constraints fed to the pipeline's availability filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConstraints {
    pub city: CityConstraint,
    pub availability: AvailabilityConstraint,
}

/// Temporal information extracted from a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Temporality {
    pub date: Option<NaiveDate>,
    pub horizon: Option<Horizon>,
    pub days_estimate: Option<i64>,
}

/// Everything the extractor knows about one request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub horizon: Horizon,
    pub days_estimate: Option<i64>,
    pub urgency: Horizon,
    pub constraints: MatchingConstraints,
}

static PATTERNS_IMMEDIATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"demain",
        r"aujourd'hui",
        r"ce soir",
        r"tout de suite",
        r"immediat",
        r"urgent",
        r"dans \d{1,2}h",
        r"sous \d{1,2}h",
        r"apres-demain",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static temporal pattern"))
    .collect()
});

static PATTERNS_SHORT_TERM: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"dans \d+ jours?",
        r"dans \d+ semaines?",
        r"d'ici \d+ jours?",
        r"d'ici \d+ semaines?",
        r"la semaine prochaine",
        r"le mois prochain",
        r"court terme",
        r"prochainement",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static temporal pattern"))
    .collect()
});

const MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("fevrier", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("aout", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("decembre", 12),
];

static PATTERNS_PLANNED: Lazy<Vec<Regex>> = Lazy::new(|| {
    let months = MONTHS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|");
    [
        r"dans \d+ mois".to_string(),
        format!(r"en (?:{months})"),
        format!(r"pour (?:{months}) \d{{4}}"),
        r"planifie".to_string(),
        r"prevu".to_string(),
        r"programme".to_string(),
        r"dans \d+ ans?".to_string(),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static temporal pattern"))
    .collect()
});

/// Implicit urgency markers, highest tier first.
const KEYWORDS_URGENCY_HIGH: &[&str] = &[
    "urgence",
    "urgent",
    "immediat",
    "critique",
    "panne",
    "fuite",
    "casse",
    "bloque",
    "rage de dent",
    "douleur",
    "mission imprevue",
    "imprevu",
    "derniere minute",
];

const KEYWORDS_URGENCY_MEDIUM: &[&str] = &[
    "rapidement",
    "vite",
    "bientot",
    "court terme",
    "sous peu",
    "des que possible",
];

/// Whole-word patterns for every known city, in static-table order.
static CITY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    geo::known_cities()
        .map(|city| {
            let pattern = format!(r"\b{}\b", regex::escape(&normalize(city)));
            (city, Regex::new(&pattern).expect("static city pattern"))
        })
        .collect()
});

static RE_MUTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"mutation (?:sur|a|vers) ([\w-]+)").expect("static pattern"));
static RE_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"unite (?:de|a) ([\w-]+)").expect("static pattern"));
static RE_DAYS_WEEKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+(jour|semaine)").expect("static pattern"));
static RE_MONTHS_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+mois").expect("static pattern"));

/// Rule-based extractor for city, temporality and urgency.
#[derive(Debug, Clone, Copy, Default)]
pub struct NerExtractor;

impl NerExtractor {
    pub fn new() -> Self {
        NerExtractor
    }

    /// Detect a known city in the message, returned in canonical capitalization.
    ///
    /// Direct whole-word scan first (prepositions like "à"/"sur"/"vers" need no
    /// special casing once the name itself matches), then the indirect
    /// "mutation sur X" / "unité de X" phrasings.
    pub fn extract_city(&self, message: &str) -> Option<String> {
        let msg = normalize(message);

        for (canonical, pattern) in CITY_PATTERNS.iter() {
            if pattern.is_match(&msg) {
                return Some((*canonical).to_string());
            }
        }

        for re in [&*RE_MUTATION, &*RE_UNIT] {
            if let Some(caps) = re.captures(&msg)
                && let Some(city) = geo::canonical_city(&caps[1])
            {
                return Some(city.to_string());
            }
        }

        None
    }

    /// Extract the temporal horizon relative to the current date.
    pub fn extract_temporality(&self, message: &str) -> Temporality {
        self.extract_temporality_at(message, Local::now().date_naive())
    }

    /// Same as [`extract_temporality`](Self::extract_temporality) with an
    /// explicit reference date, so resolution is testable.
    pub fn extract_temporality_at(&self, message: &str, today: NaiveDate) -> Temporality {
        let msg = normalize(message);
        let mut result = Temporality::default();

        // IMMEDIATE (<= 24-48h)
        if PATTERNS_IMMEDIATE.iter().any(|re| re.is_match(&msg)) {
            result.horizon = Some(Horizon::Immediate);
            result.days_estimate = Some(0);
            if msg.contains("apres-demain") {
                result.date = today.checked_add_days(chrono::Days::new(2));
            } else if msg.contains("demain") {
                result.date = today.checked_add_days(chrono::Days::new(1));
            } else if msg.contains("aujourd'hui") || msg.contains("ce soir") {
                result.date = Some(today);
            }
            return result;
        }

        // SHORT_TERM (<= 30 days)
        for re in PATTERNS_SHORT_TERM.iter() {
            let Some(found) = re.find(&msg) else { continue };
            result.horizon = Some(Horizon::ShortTerm);
            if let Some(caps) = RE_DAYS_WEEKS.captures(found.as_str()) {
                let n: i64 = caps[1].parse().unwrap_or(0);
                let days = if &caps[2] == "semaine" { n * 7 } else { n };
                result.days_estimate = Some(days);
                result.date = today.checked_add_days(chrono::Days::new(days.max(0) as u64));
            } else {
                result.days_estimate = Some(15);
            }
            return result;
        }

        // PLANNED (> 30 days)
        for re in PATTERNS_PLANNED.iter() {
            let Some(found) = re.find(&msg) else { continue };
            result.horizon = Some(Horizon::Planned);
            if let Some(caps) = RE_MONTHS_COUNT.captures(found.as_str()) {
                let months: i64 = caps[1].parse().unwrap_or(0);
                result.days_estimate = Some(months * 30);
                result.date = today.checked_add_days(chrono::Days::new((months * 30) as u64));
            } else {
                result.days_estimate = Some(90);
            }

            // A named month pins the date to the middle of that month
            for (name, number) in MONTHS {
                if !msg.contains(name) {
                    continue;
                }
                let mut year = today.year();
                if *number < today.month() {
                    year += 1;
                }
                if let Some(target) = NaiveDate::from_ymd_opt(year, *number, 15) {
                    result.date = Some(target);
                    result.days_estimate = Some((target - today).num_days());
                }
                break;
            }
            return result;
        }

        // No explicit temporality: fall back on urgency markers
        if KEYWORDS_URGENCY_HIGH.iter().any(|kw| msg.contains(kw)) {
            result.horizon = Some(Horizon::Immediate);
            result.days_estimate = Some(0);
        } else if KEYWORDS_URGENCY_MEDIUM.iter().any(|kw| msg.contains(kw)) {
            result.horizon = Some(Horizon::ShortTerm);
            result.days_estimate = Some(7);
        }

        result
    }

    /// Deduce the urgency level.
    ///
    /// An explicit urgency field ("Immédiat" / "Court terme" / "Planifié")
    /// wins; otherwise a keyword sweep over the message, then the temporal
    /// horizon, then STANDARD.
    pub fn extract_urgency(&self, message: &str, explicit: Option<&str>) -> Horizon {
        if let Some(level) = explicit.filter(|s| !s.trim().is_empty()) {
            let level = normalize(level);
            if level.contains("immediat") || level.contains("urgent") {
                return Horizon::Immediate;
            }
            if level.contains("court terme") {
                return Horizon::ShortTerm;
            }
            if level.contains("planifie") {
                return Horizon::Planned;
            }
            return Horizon::Standard;
        }

        let msg = normalize(message);
        if KEYWORDS_URGENCY_HIGH.iter().any(|kw| msg.contains(kw)) {
            return Horizon::Immediate;
        }
        if KEYWORDS_URGENCY_MEDIUM.iter().any(|kw| msg.contains(kw)) {
            return Horizon::ShortTerm;
        }
        if let Some(horizon) = self.extract_temporality(message).horizon {
            return horizon;
        }
        Horizon::Standard
    }

    /// Full extraction over one message.
    pub fn extract_all(&self, message: &str, explicit_urgency: Option<&str>) -> ExtractedEntities {
        self.extract_all_at(message, explicit_urgency, Local::now().date_naive())
    }

    /// [`extract_all`](Self::extract_all) with an explicit reference date.
    pub fn extract_all_at(
        &self,
        message: &str,
        explicit_urgency: Option<&str>,
        today: NaiveDate,
    ) -> ExtractedEntities {
        let city = self.extract_city(message);
        let tempo = self.extract_temporality_at(message, today);
        let urgency = self.extract_urgency(message, explicit_urgency);
        let constraints = derive_constraints(city.as_deref(), tempo.horizon, urgency);

        ExtractedEntities {
            city,
            date: tempo.date,
            horizon: tempo.horizon.unwrap_or(urgency),
            days_estimate: tempo.days_estimate,
            urgency,
            constraints,
        }
    }
}

/// Matching constraints from the extracted entities.
fn derive_constraints(
    city: Option<&str>,
    horizon: Option<Horizon>,
    urgency: Horizon,
) -> MatchingConstraints {
    let city_constraint = if city.is_some() {
        // A match on the city is preferred but never blocking
        CityConstraint::Preferred
    } else {
        CityConstraint::National
    };

    let availability = if urgency == Horizon::Immediate || horizon == Some(Horizon::Immediate) {
        AvailabilityConstraint::TwentyFourSeven
    } else if urgency == Horizon::ShortTerm || horizon == Some(Horizon::ShortTerm) {
        AvailabilityConstraint::Rapide
    } else if urgency == Horizon::Planned || horizon == Some(Horizon::Planned) {
        AvailabilityConstraint::All
    } else {
        AvailabilityConstraint::Semaine
    };

    MatchingConstraints {
        city: city_constraint,
        availability,
    }
}

/// Whether a provider availability string satisfies the derived constraint.
pub fn availability_compatible(provider_availability: &str, constraint: AvailabilityConstraint) -> bool {
    let dispo = normalize(provider_availability);
    match constraint {
        AvailabilityConstraint::All | AvailabilityConstraint::Semaine => true,
        AvailabilityConstraint::TwentyFourSeven => {
            dispo.contains("24/7") || dispo.contains("urgence")
        }
        AvailabilityConstraint::Rapide => {
            dispo.contains("24/7")
                || dispo.contains("urgence")
                || dispo.contains("rapide")
                || dispo.contains("samedi")
                || dispo.contains("en ligne")
        }
    }
}
