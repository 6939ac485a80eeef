//! Deterministic re-scoring pipeline
//!
//! A fixed sequence of pure transforms over the candidate rows surviving the
//! domain filter: availability filter, semantic/geo blend, urgency boost,
//! specialization penalty, gap amplification, secondary-rank filter, absolute
//! threshold, adaptive top-K, confidence labels. Each stage writes its own
//! column on [`ScoreRow`] and never touches the columns of earlier stages, so
//! every intermediate value stays available for explanation and tests.

use crate::catalog::Provider;
use crate::geo::{GeoImpact, GeoResolver};
use crate::ner::{self, ExtractedEntities, Horizon};
use crate::text::{count_expertise_tokens, normalize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-candidate score columns, one per pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    /// Row index into the catalog
    pub index: usize,
    /// Base cosine similarity
    pub base: f32,
    /// Geographic score in [0, 1]
    pub geo: f32,
    /// Weighted semantic/geo combination
    pub blended: f32,
    /// Urgency multiplier in [1.0, 1.15]
    pub urgency_factor: f32,
    /// Score after the urgency boost (clipped at 1.0)
    pub boosted: f32,
    /// Specialization multiplier in [0.85, 1.0]
    pub specialization_factor: f32,
    /// Score after the specialization penalty
    pub penalized: f32,
    /// Final score after gap amplification
    pub amplified: f32,
}

impl ScoreRow {
    pub fn new(index: usize, base: f32) -> Self {
        Self {
            index,
            base,
            geo: 1.0,
            blended: base,
            urgency_factor: 1.0,
            boosted: base,
            specialization_factor: 1.0,
            penalized: base,
            amplified: base,
        }
    }
}

/// Human-readable confidence bucket, a pure function of the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "À vérifier")]
    ToVerify,
    #[serde(rename = "Approchant")]
    Approaching,
    #[serde(rename = "Pertinent")]
    Relevant,
    #[serde(rename = "Très pertinent")]
    HighlyRelevant,
}

impl Confidence {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.85 {
            Confidence::HighlyRelevant
        } else if score >= 0.70 {
            Confidence::Relevant
        } else if score >= 0.50 {
            Confidence::Approaching
        } else {
            Confidence::ToVerify
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::HighlyRelevant => "Très pertinent",
            Confidence::Relevant => "Pertinent",
            Confidence::Approaching => "Approchant",
            Confidence::ToVerify => "À vérifier",
        };
        f.write_str(label)
    }
}

/// One returned provider with every per-stage contribution exposed.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub provider_id: String,
    pub name: String,
    pub expertise: String,
    pub availability: String,
    pub city: Option<String>,
    pub base_score: f32,
    pub geo_score: f32,
    pub urgency_factor: f32,
    pub specialization_factor: f32,
    pub score: f32,
    pub confidence: Confidence,
}

/// Read-only inputs shared by every stage of one query.
pub struct PipelineContext<'a> {
    pub providers: &'a [Provider],
    pub entities: &'a ExtractedEntities,
    pub impact: GeoImpact,
    pub resolver: &'a GeoResolver,
    /// False when no provider carries a city: the blend degrades to pure semantic
    pub geo_enabled: bool,
    pub threshold: f32,
    pub max_k: usize,
}

/// Run the full stage sequence and return the surviving rows, sorted
/// descending by final score.
pub fn run(mut rows: Vec<ScoreRow>, ctx: &PipelineContext<'_>) -> Vec<ScoreRow> {
    rows = filter_availability(rows, ctx.providers, ctx.entities.constraints.availability);
    blend_geo(
        &mut rows,
        ctx.providers,
        ctx.entities.city.as_deref(),
        ctx.impact,
        ctx.resolver,
        ctx.geo_enabled,
    );
    boost_urgency(&mut rows, ctx.providers, ctx.entities.urgency);
    penalize_generic(&mut rows, ctx.providers);
    amplify_gap(&mut rows);
    rows = filter_secondary_ranks(rows);
    rows.retain(|r| r.amplified >= ctx.threshold.max(0.10));
    adaptive_top_k(rows, ctx.max_k)
}

/// Stage 1: drop providers whose availability cannot satisfy the constraint.
pub fn filter_availability(
    mut rows: Vec<ScoreRow>,
    providers: &[Provider],
    constraint: ner::AvailabilityConstraint,
) -> Vec<ScoreRow> {
    rows.retain(|row| {
        providers
            .get(row.index)
            .is_some_and(|p| ner::availability_compatible(&p.availability, constraint))
    });
    rows
}

/// Stage 2: adaptive semantic/geo blend.
///
/// Weights depend on the impact level; with no request city or no city data in
/// the catalog the geo column is pinned to 1.0 and the blend is pure semantic.
pub fn blend_geo(
    rows: &mut [ScoreRow],
    providers: &[Provider],
    city_need: Option<&str>,
    impact: GeoImpact,
    resolver: &GeoResolver,
    geo_enabled: bool,
) {
    let city_need = city_need.filter(|c| !c.trim().is_empty());
    if !geo_enabled || city_need.is_none() {
        for row in rows.iter_mut() {
            row.geo = 1.0;
            row.blended = row.base;
        }
        return;
    }

    let (w_semantic, w_geo) = impact.blend_weights();
    for row in rows.iter_mut() {
        let geo = match providers.get(row.index).and_then(|p| p.city.as_deref()) {
            Some(city) => resolver.geo_score(city_need, city, impact),
            // Provider without a city: same fallback as an unresolvable distance
            None => {
                if impact == GeoImpact::Online {
                    1.0
                } else {
                    0.7
                }
            }
        };
        row.geo = geo;
        row.blended = w_semantic * row.base + w_geo * geo;
    }
}

/// Stage 3: +15% for round-the-clock providers on immediate needs, clipped to 1.0.
pub fn boost_urgency(rows: &mut [ScoreRow], providers: &[Provider], urgency: Horizon) {
    for row in rows.iter_mut() {
        let factor = if urgency == Horizon::Immediate {
            match providers.get(row.index) {
                Some(p) => {
                    let dispo = normalize(&p.availability);
                    if dispo.contains("24/7") || dispo.contains("urgence") {
                        1.15
                    } else {
                        1.0
                    }
                }
                None => 1.0,
            }
        } else {
            1.0
        };
        row.urgency_factor = factor;
        row.boosted = (row.blended * factor).min(1.0);
    }
}

/// Stage 4: penalize providers spread over many expertise domains.
pub fn penalize_generic(rows: &mut [ScoreRow], providers: &[Provider]) {
    for row in rows.iter_mut() {
        let factor = match providers.get(row.index) {
            Some(p) => specialization_factor(&p.expertise),
            None => 1.0,
        };
        row.specialization_factor = factor;
        row.penalized = row.boosted * factor;
    }
}

/// Multiplier from the number of comma-separated expertise tokens.
pub fn specialization_factor(expertise: &str) -> f32 {
    let count = count_expertise_tokens(expertise);
    if expertise.trim().is_empty() {
        0.95
    } else if count >= 6 {
        0.85
    } else if count == 5 {
        0.90
    } else if count == 4 {
        0.95
    } else {
        1.0
    }
}

/// Stage 5: widen the gap between good and poor matches.
pub fn amplify_gap(rows: &mut [ScoreRow]) {
    for row in rows.iter_mut() {
        row.amplified = amplify(row.penalized);
    }
}

/// Piecewise amplification: boosts strong scores, dampens weak ones.
/// Monotone non-decreasing and maps [0, 1] to [0, 1].
pub fn amplify(score: f32) -> f32 {
    let amplified = if score >= 0.70 {
        (score * 1.25).min(1.0)
    } else if score >= 0.60 {
        score * 1.15
    } else if score >= 0.50 {
        score * 1.10
    } else if score >= 0.45 {
        score * 1.05
    } else if score >= 0.35 {
        score
    } else if score >= 0.30 {
        score * 0.85
    } else {
        score * 0.70
    };
    amplified.clamp(0.0, 1.0)
}

/// Stage 6: a secondary rank survives only within 30% of the leader and above
/// an absolute floor of 0.30. Returns the rows sorted descending.
pub fn filter_secondary_ranks(mut rows: Vec<ScoreRow>) -> Vec<ScoreRow> {
    if rows.is_empty() {
        return rows;
    }
    sort_descending(&mut rows);
    let top = rows[0].amplified;
    let cutoff = (top * 0.70).max(0.30);
    rows.retain(|r| r.amplified >= cutoff);
    rows
}

/// Stage 8: result count scales with the quality of the leader.
pub fn adaptive_top_k(mut rows: Vec<ScoreRow>, max_k: usize) -> Vec<ScoreRow> {
    if rows.is_empty() {
        return rows;
    }
    sort_descending(&mut rows);
    let top = rows[0].amplified;
    let optimal_k = if top >= 0.85 {
        3
    } else if top >= 0.70 {
        2
    } else {
        1
    };
    rows.truncate(optimal_k.min(max_k));
    rows
}

fn sort_descending(rows: &mut [ScoreRow]) {
    rows.sort_by(|a, b| {
        b.amplified
            .partial_cmp(&a.amplified)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
