//! Universal properties of the matching pipeline, independent of scenario.

mod common;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use common::{assert_result_invariants, matcher_with, provider, TopicEmbedder};
use presta_match::catalog::Catalog;
use presta_match::config::Config;
use presta_match::domain;
use presta_match::embeddings::Embedder;
use presta_match::geo::{GeoImpact, GeoResolver};
use presta_match::matcher::{MatchOptions, Matcher, Request};
use presta_match::text::normalize;
use std::sync::Arc;

fn sample_catalog() -> Vec<presta_match::catalog::Provider> {
    vec![
        provider(
            "P-GARDE-1",
            "Garde Express",
            "garde, enfant, crèche",
            "24/7",
            "garde d'enfants à domicile",
            Some("Paris"),
        ),
        provider(
            "P-IMMO-LYON",
            "Agence du Rhône",
            "immobilier, location meublée, appartement",
            "Semaine",
            "locations meublées",
            Some("Lyon"),
        ),
        provider(
            "P-BANQUE-1",
            "Banque Azur",
            "banque, crédit, prêt immobilier",
            "En ligne",
            "prêts immobiliers et placements",
            None,
        ),
        provider(
            "P-GEN-1",
            "Multi Services Plus",
            "garde, ménage, cuisine, jardinage, courses, repassage",
            "24/7",
            "services à la personne",
            Some("Marseille"),
        ),
    ]
}

fn sample_requests() -> Vec<Request> {
    vec![
        Request {
            message: "mission imprévue demain, garde d'enfants à Paris".into(),
            sub_category: Some("Garde d'enfant".into()),
            impact_geo: Some(GeoImpact::OnSite),
            ..Request::default()
        },
        Request {
            message: "recherche location meublée à Lyon".into(),
            sub_category: Some("Location meublée".into()),
            impact_geo: Some(GeoImpact::Local),
            ..Request::default()
        },
        Request {
            message: "prêt immobilier pour un achat".into(),
            sub_category: Some("Prêt immobilier".into()),
            impact_geo: Some(GeoImpact::Online),
            ..Request::default()
        },
        Request::from_text("message sans rapport avec le catalogue"),
    ]
}

#[tokio::test]
async fn every_query_satisfies_the_universal_invariants() {
    let matcher = matcher_with(sample_catalog()).await;
    for request in sample_requests() {
        let results = matcher
            .find_matches(&request, &MatchOptions::default())
            .await
            .unwrap();
        assert_result_invariants(&results);
    }
}

#[tokio::test]
async fn pipeline_is_idempotent() {
    let matcher = matcher_with(sample_catalog()).await;
    for request in sample_requests() {
        let first = matcher
            .find_matches(&request, &MatchOptions::default())
            .await
            .unwrap();
        let second = matcher
            .find_matches(&request, &MatchOptions::default())
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[tokio::test]
async fn returned_providers_always_satisfy_the_domain_rule() {
    let matcher = matcher_with(sample_catalog()).await;
    let request = Request {
        message: "recherche location meublée à Lyon".into(),
        sub_category: Some("Location meublée".into()),
        impact_geo: Some(GeoImpact::Local),
        ..Request::default()
    };
    let results = matcher
        .find_matches(&request, &MatchOptions::default())
        .await
        .unwrap();
    assert!(!results.is_empty());

    let rule = domain::build_rule(None, Some("Location meublée")).unwrap();
    for r in &results {
        assert!(
            domain::provider_passes(&rule, &r.expertise),
            "{} violates the domain rule",
            r.provider_id
        );
        for forbidden in &rule.exclusions {
            assert!(!normalize(&r.expertise).contains(forbidden.as_str()));
        }
    }
}

#[tokio::test]
async fn batch_survives_a_failing_row() {
    /// Fails on request texts containing a marker, so one need in the batch
    /// can be made to blow up while provider encoding stays healthy.
    struct FlakyEmbedder(TopicEmbedder);

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("panne-simulee")) {
                anyhow::bail!("simulated backend outage");
            }
            self.0.embed_batch(texts).await
        }
        fn dimensions(&self) -> usize {
            self.0.dimensions()
        }
    }

    let catalog = Catalog::new(sample_catalog()).unwrap();
    let matcher = Matcher::new(
        catalog,
        Arc::new(FlakyEmbedder(TopicEmbedder::with_default_topics())),
        GeoResolver::default(),
        &Config::default(),
    )
    .await
    .unwrap();

    let needs = vec![
        Request::from_text("garde d'enfants à Paris"),
        Request::from_text("panne-simulee"),
        Request::from_text("prêt immobilier"),
    ];
    let all = matcher.batch_match(&needs, &MatchOptions::default()).await;

    assert_eq!(all.len(), 3);
    assert!(!all[0].is_empty());
    // The failing row yields an empty result list instead of aborting
    assert!(all[1].is_empty());
    assert!(!all[2].is_empty());
}

#[tokio::test]
async fn availability_filter_can_empty_the_result_set() {
    let matcher = matcher_with(vec![provider(
        "P-GARDE-WEEK",
        "Garde Semaine",
        "garde, enfant, crèche",
        "Semaine uniquement",
        "garde d'enfants",
        Some("Paris"),
    )])
    .await;

    // Immediate need, but the only childcare provider is week-days only
    let request = Request {
        message: "urgence, garde d'enfants tout de suite à Paris".into(),
        sub_category: Some("Garde d'enfant".into()),
        impact_geo: Some(GeoImpact::OnSite),
        ..Request::default()
    };
    let results = matcher
        .find_matches(&request, &MatchOptions::default())
        .await
        .unwrap();
    assert!(results.is_empty());
}
