//! Shared helpers for integration tests: a deterministic topic-profile
//! embedder whose cosine values are computable by hand, plus catalog builders.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use presta_match::catalog::{Catalog, Provider};
use presta_match::config::Config;
use presta_match::embeddings::Embedder;
use presta_match::geo::GeoResolver;
use presta_match::matcher::Matcher;
use presta_match::text::normalize;
use presta_match::MatchResult;
use std::sync::Arc;

/// One dimension per topic; a text's vector has a 1 on every topic axis whose
/// keywords occur in the normalized text, then is L2-normalized. Two texts
/// sharing all their topics get cosine 1.0, disjoint texts get 0.0.
pub struct TopicEmbedder {
    topics: Vec<Vec<&'static str>>,
}

impl TopicEmbedder {
    pub fn with_default_topics() -> Self {
        Self {
            topics: vec![
                vec!["garde", "enfant", "creche", "nounou", "babysitting"],
                vec!["banque", "credit", "pret", "finance", "placement"],
                vec![
                    "immobilier",
                    "location",
                    "appartement",
                    "logement",
                    "meuble",
                    "habitation",
                ],
                vec!["plomberie", "electricite", "chauffage"],
                vec!["garage", "mecanique", "vehicule", "voiture"],
                vec!["menage", "repassage"],
                vec!["jardinage"],
                vec!["cuisine"],
            ],
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let text = normalize(text);
        let mut v: Vec<f32> = self
            .topics
            .iter()
            .map(|keywords| {
                if keywords.iter().any(|k| text.contains(k)) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.topics.len()
    }
}

pub fn provider(
    id: &str,
    name: &str,
    expertise: &str,
    availability: &str,
    description: &str,
    city: Option<&str>,
) -> Provider {
    Provider {
        id: id.into(),
        name: name.into(),
        expertise: expertise.into(),
        availability: availability.into(),
        description: description.into(),
        city: city.map(str::to_string),
    }
}

pub async fn matcher_with(providers: Vec<Provider>) -> Matcher {
    let catalog = Catalog::new(providers).expect("test catalog");
    Matcher::new(
        catalog,
        Arc::new(TopicEmbedder::with_default_topics()),
        GeoResolver::default(),
        &Config::default(),
    )
    .await
    .expect("test matcher")
}

/// Universal result invariants: bounds, descending order, length cap.
pub fn assert_result_invariants(results: &[MatchResult]) {
    assert!(results.len() <= 3, "more than 3 results returned");
    for pair in results.windows(2) {
        assert!(
            pair[0].score >= pair[1].score,
            "results not sorted descending"
        );
    }
    for r in results {
        assert!((0.0..=1.0).contains(&r.base_score), "base out of bounds");
        assert!((0.0..=1.0).contains(&r.geo_score), "geo out of bounds");
        assert!((1.0..=1.15).contains(&r.urgency_factor));
        assert!((0.85..=1.0).contains(&r.specialization_factor));
        assert!((0.0..=1.0).contains(&r.score), "final score out of bounds");
    }
}
