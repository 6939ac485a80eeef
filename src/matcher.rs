//! Matcher facade
//!
//! Owns the provider catalog, the pre-encoded embedding matrix and the
//! extraction/scoring collaborators, and orchestrates one query end to end:
//! domain filter, NER, request encoding, cosine ranking, score pipeline.
//! Providers are encoded once at construction; queries share the matrix
//! read-only and only allocate score columns sized to the candidate set.

use crate::catalog::{Catalog, NeedRecord};
use crate::config::Config;
use crate::domain;
use crate::embeddings::Embedder;
use crate::error::{MatchError, Result};
use crate::geo::{GeoImpact, GeoResolver};
use crate::ner::{CityConstraint, NerExtractor};
use crate::pipeline::{self, Confidence, MatchResult, PipelineContext, ScoreRow};
use crate::text;
use crate::utils::math::{cosine_similarity, l2_normalize};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// One user service demand: free text plus optional structured fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub message: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    /// Explicit urgency level ("Immédiat" / "Court terme" / "Planifié")
    pub urgency: Option<String>,
    /// Explicit city, takes precedence over NER detection
    pub city: Option<String>,
    pub impact_geo: Option<GeoImpact>,
}

impl Request {
    pub fn from_text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

impl TryFrom<&NeedRecord> for Request {
    type Error = MatchError;

    fn try_from(record: &NeedRecord) -> Result<Self> {
        let impact_geo = record.impact_geo.map(GeoImpact::try_from).transpose()?;
        Ok(Request {
            message: record.message.clone(),
            category: record.category.clone(),
            sub_category: record.sub_category.clone(),
            urgency: record.urgency.clone(),
            city: record.city.clone(),
            impact_geo,
        })
    }
}

/// Per-query knobs.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Upper bound on returned rows, capped at 3 by the adaptive top-K
    pub top_k: usize,
    /// Minimum final score, floored at 0.10 by the pipeline
    pub threshold: f32,
    pub apply_domain_filter: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: 0.25,
            apply_domain_filter: true,
        }
    }
}

impl MatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.matching.top_k,
            threshold: config.matching.threshold,
            apply_domain_filter: config.matching.apply_domain_filter,
        }
    }
}

/// The matching engine: catalog + encoded matrix + collaborators.
pub struct Matcher {
    catalog: Catalog,
    embedder: Arc<dyn Embedder>,
    resolver: GeoResolver,
    ner: NerExtractor,
    /// Row-major, L2-normalized provider embedding matrix
    matrix: Vec<f32>,
    dims: usize,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl Matcher {
    /// Build the matcher and encode the whole catalog in one pass.
    ///
    /// An unreachable embedding backend or an empty catalog fails here, not at
    /// query time.
    pub async fn new(
        catalog: Catalog,
        embedder: Arc<dyn Embedder>,
        resolver: GeoResolver,
        config: &Config,
    ) -> Result<Self> {
        let dims = embedder.dimensions();
        if dims == 0 {
            return Err(MatchError::Embedding {
                message: "embedding backend reports zero dimensions".into(),
            });
        }

        let texts: Vec<String> = catalog.providers().iter().map(text::provider_text).collect();
        let mut matrix = Vec::with_capacity(texts.len() * dims);
        let batch_size = config.embedding.batch_size.max(1);
        for chunk in texts.chunks(batch_size) {
            let vectors =
                embedder
                    .embed_batch(chunk)
                    .await
                    .map_err(|e| MatchError::Embedding {
                        message: e.to_string(),
                    })?;
            if vectors.len() != chunk.len() {
                return Err(MatchError::Embedding {
                    message: format!(
                        "backend returned {} vectors for a batch of {}",
                        vectors.len(),
                        chunk.len()
                    ),
                });
            }
            for mut vector in vectors {
                if vector.len() != dims {
                    return Err(MatchError::Embedding {
                        message: format!(
                            "backend returned {} dims, expected {}",
                            vector.len(),
                            dims
                        ),
                    });
                }
                l2_normalize(&mut vector);
                matrix.extend_from_slice(&vector);
            }
        }
        info!("Encoded {} providers ({} dims)", catalog.len(), dims);

        let cache_capacity = NonZeroUsize::new(config.runtime.cache_max.max(1))
            .expect("cache capacity is at least 1");

        Ok(Self {
            catalog,
            embedder,
            resolver,
            ner: NerExtractor::new(),
            matrix,
            dims,
            query_cache: Mutex::new(LruCache::new(cache_capacity)),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn vector(&self, index: usize) -> &[f32] {
        &self.matrix[index * self.dims..(index + 1) * self.dims]
    }

    /// Run one query through the full pipeline.
    pub async fn find_matches(
        &self,
        request: &Request,
        opts: &MatchOptions,
    ) -> Result<Vec<MatchResult>> {
        let impact = request.impact_geo.unwrap_or(GeoImpact::Local);

        // Hard domain pre-filter, fail-open on an empty candidate set
        let mut candidates: Vec<usize> = (0..self.catalog.len()).collect();
        if opts.apply_domain_filter
            && (request.category.is_some() || request.sub_category.is_some())
            && let Some(rule) = domain::build_rule(
                request.category.as_deref(),
                request.sub_category.as_deref(),
            )
        {
            let filtered: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&i| domain::provider_passes(&rule, &self.catalog.providers()[i].expertise))
                .collect();
            if filtered.is_empty() {
                warn!(
                    sub_category = request.sub_category.as_deref().unwrap_or(""),
                    "domain filter matched no provider, bypassing it for this query"
                );
            } else {
                debug!(
                    "domain filter: {} -> {} providers",
                    self.catalog.len(),
                    filtered.len()
                );
                candidates = filtered;
            }
        }

        let mut entities = self
            .ner
            .extract_all(&request.message, request.urgency.as_deref());
        if let Some(city) = request.city.as_deref().filter(|c| !c.trim().is_empty()) {
            entities.city = Some(city.to_string());
            entities.constraints.city = CityConstraint::Preferred;
        }

        let request_text = text::request_text(
            request.category.as_deref(),
            request.sub_category.as_deref(),
            request.urgency.as_deref(),
            &request.message,
        );
        let query = self.embed_request(&request_text).await?;

        let rows: Vec<ScoreRow> = candidates
            .iter()
            .map(|&i| ScoreRow::new(i, cosine_similarity(&query, self.vector(i))))
            .collect();

        let ctx = PipelineContext {
            providers: self.catalog.providers(),
            entities: &entities,
            impact,
            resolver: &self.resolver,
            geo_enabled: self.catalog.has_cities(),
            threshold: opts.threshold,
            max_k: opts.top_k.min(3),
        };
        let rows = pipeline::run(rows, &ctx);
        debug!("query yielded {} results", rows.len());

        Ok(rows.iter().map(|row| self.to_result(row)).collect())
    }

    /// Match a whole needs table against the shared provider encoding.
    ///
    /// A failure on one need is logged and yields an empty result list for
    /// that row; it never aborts the batch.
    pub async fn batch_match(
        &self,
        needs: &[Request],
        opts: &MatchOptions,
    ) -> Vec<Vec<MatchResult>> {
        let mut all = Vec::with_capacity(needs.len());
        for (i, need) in needs.iter().enumerate() {
            match self.find_matches(need, opts).await {
                Ok(results) => all.push(results),
                Err(e) => {
                    warn!("matching failed for need {}: {}", i, e);
                    all.push(Vec::new());
                }
            }
        }
        info!("batch matching done: {} needs processed", needs.len());
        all
    }

    async fn embed_request(&self, request_text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self
            .query_cache
            .lock()
            .expect("query cache poisoned")
            .get(request_text)
        {
            return Ok(cached.clone());
        }
        let mut vector =
            self.embedder
                .embed(request_text)
                .await
                .map_err(|e| MatchError::Embedding {
                    message: e.to_string(),
                })?;
        if vector.len() != self.dims {
            return Err(MatchError::Embedding {
                message: format!(
                    "backend returned {} dims for the request, expected {}",
                    vector.len(),
                    self.dims
                ),
            });
        }
        l2_normalize(&mut vector);
        self.query_cache
            .lock()
            .expect("query cache poisoned")
            .put(request_text.to_string(), vector.clone());
        Ok(vector)
    }

    fn to_result(&self, row: &ScoreRow) -> MatchResult {
        let provider = &self.catalog.providers()[row.index];
        MatchResult {
            provider_id: provider.id.clone(),
            name: provider.name.clone(),
            expertise: provider.expertise.clone(),
            availability: provider.availability.clone(),
            city: provider.city.clone(),
            base_score: row.base,
            geo_score: row.geo,
            urgency_factor: row.urgency_factor,
            specialization_factor: row.specialization_factor,
            score: row.amplified,
            confidence: Confidence::from_score(row.amplified),
        }
    }
}
