//! End-to-end matching scenarios over a deterministic topic embedder.

mod common;

use common::{assert_result_invariants, matcher_with, provider};
use presta_match::geo::GeoImpact;
use presta_match::matcher::{MatchOptions, Request};
use presta_match::Confidence;

fn opts() -> MatchOptions {
    MatchOptions::default()
}

#[tokio::test]
async fn urgent_childcare_in_paris() {
    let matcher = matcher_with(vec![
        provider(
            "P-GARDE-1",
            "Garde Express",
            "garde, enfant, crèche",
            "24/7",
            "garde d'enfants à domicile",
            Some("Paris"),
        ),
        provider(
            "P-GARDE-2",
            "Nounou Sud",
            "garde, enfant, nounou",
            "24/7 urgence",
            "garde d'enfants",
            Some("Marseille"),
        ),
        provider(
            "P-GEN-1",
            "Multi Services Plus",
            "garde, ménage, cuisine, jardinage, courses, repassage",
            "24/7",
            "services à la personne",
            Some("Paris"),
        ),
        provider(
            "P-PLOMB-1",
            "Plombi Pro",
            "plomberie, chauffage",
            "Semaine uniquement",
            "dépannage plomberie",
            Some("Paris"),
        ),
    ])
    .await;

    let request = Request {
        message: "mission imprévue demain matin, besoin garde 2 enfants à Paris".into(),
        sub_category: Some("Garde d'enfant".into()),
        impact_geo: Some(GeoImpact::OnSite),
        ..Request::default()
    };
    let results = matcher.find_matches(&request, &opts()).await.unwrap();
    assert_result_invariants(&results);

    assert!(!results.is_empty());
    let top = &results[0];
    // The specialized Paris provider with round-the-clock availability wins
    assert_eq!(top.provider_id, "P-GARDE-1");
    assert!(top.availability.contains("24/7"));
    assert!(top.confidence >= Confidence::Relevant);
    assert!((1.0..=1.15).contains(&top.urgency_factor));

    // The six-domain generalist may appear, but never as top-1
    assert_ne!(results[0].provider_id, "P-GEN-1");
    if let Some(generic) = results.iter().find(|r| r.provider_id == "P-GEN-1") {
        assert!((generic.specialization_factor - 0.85).abs() < 1e-6);
    }

    // The plumber is filtered out before scoring even starts
    assert!(results.iter().all(|r| r.provider_id != "P-PLOMB-1"));
}

#[tokio::test]
async fn mortgage_is_an_online_service() {
    let matcher = matcher_with(vec![
        provider(
            "P-BANQUE-1",
            "Banque Azur",
            "banque, crédit, prêt immobilier",
            "En ligne",
            "prêts immobiliers et placements",
            Some("Paris"),
        ),
        provider(
            "P-IMMO-1",
            "Agence du Port",
            "immobilier, location",
            "Semaine",
            "agence immobilière",
            Some("Marseille"),
        ),
        provider(
            "P-PLOMB-1",
            "Plombi Pro",
            "plomberie, chauffage",
            "24/7",
            "dépannage plomberie",
            Some("Marseille"),
        ),
    ])
    .await;

    let request = Request {
        message: "besoin d'un prêt immobilier pour un achat à Marseille".into(),
        sub_category: Some("Prêt immobilier".into()),
        impact_geo: Some(GeoImpact::Online),
        ..Request::default()
    };
    let results = matcher.find_matches(&request, &opts()).await.unwrap();
    assert_result_invariants(&results);

    assert!(!results.is_empty());
    assert_eq!(results[0].provider_id, "P-BANQUE-1");
    for r in &results {
        // Distance is irrelevant for an online service, and nothing is urgent
        assert_eq!(r.geo_score, 1.0);
        assert_eq!(r.urgency_factor, 1.0);
    }
}

#[tokio::test]
async fn furnished_rental_prefers_local_real_estate() {
    let matcher = matcher_with(vec![
        provider(
            "P-IMMO-LYON",
            "Agence du Rhône",
            "immobilier, location meublée, appartement",
            "Semaine",
            "locations meublées",
            Some("Lyon"),
        ),
        provider(
            "P-IMMO-MARS",
            "Agence du Vieux-Port",
            "immobilier, location meublée, appartement",
            "Semaine",
            "locations meublées",
            Some("Marseille"),
        ),
        provider(
            "P-ELEC-LYON",
            "Electric City",
            "électricité, dépannage électrique",
            "24/7",
            "interventions électriques",
            Some("Lyon"),
        ),
    ])
    .await;

    let request = Request {
        message: "recherche location meublée à Lyon".into(),
        sub_category: Some("Location meublée".into()),
        impact_geo: Some(GeoImpact::Local),
        ..Request::default()
    };
    let results = matcher.find_matches(&request, &opts()).await.unwrap();
    assert_result_invariants(&results);

    // Incompatible trades never surface for a housing request
    assert!(results.iter().all(|r| r.provider_id != "P-ELEC-LYON"));
    for r in &results {
        let expertise = presta_match::text::normalize(&r.expertise);
        for forbidden in ["electri", "plomb", "garage", "vehicule"] {
            assert!(!expertise.contains(forbidden));
        }
    }

    // Same expertise, different city: Lyon outranks Marseille
    let lyon = results
        .iter()
        .find(|r| r.provider_id == "P-IMMO-LYON")
        .expect("Lyon agency present");
    assert_eq!(results[0].provider_id, "P-IMMO-LYON");
    if let Some(marseille) = results.iter().find(|r| r.provider_id == "P-IMMO-MARS") {
        assert!(lyon.score > marseille.score);
        assert!(lyon.geo_score > marseille.geo_score);
    }
}

#[tokio::test]
async fn unknown_city_degrades_geo_score_not_results() {
    let matcher = matcher_with(vec![provider(
        "P-GARDE-1",
        "Garde Express",
        "garde, enfant, crèche",
        "24/7",
        "garde d'enfants à domicile",
        Some("Paris"),
    )])
    .await;

    // Perpignan is outside the static city table and no geocoder is wired in
    let request = Request {
        message: "besoin de garde pour deux enfants".into(),
        city: Some("Perpignan".into()),
        impact_geo: Some(GeoImpact::Local),
        ..Request::default()
    };
    let results = matcher.find_matches(&request, &opts()).await.unwrap();
    assert_result_invariants(&results);

    assert!(!results.is_empty());
    assert_eq!(results[0].geo_score, 0.7);
}

#[tokio::test]
async fn empty_domain_filter_falls_back_to_full_catalog() {
    let matcher = matcher_with(vec![
        provider(
            "P-GARDE-1",
            "Garde Express",
            "garde, enfant, crèche",
            "24/7",
            "garde d'enfants à domicile",
            Some("Paris"),
        ),
        provider(
            "P-BANQUE-1",
            "Banque Azur",
            "banque, crédit, prêt immobilier",
            "En ligne",
            "prêts immobiliers",
            None,
        ),
    ])
    .await;

    let request = Request {
        message: "besoin de garde d'enfant la semaine prochaine".into(),
        sub_category: Some("xyz inconnu".into()),
        impact_geo: Some(GeoImpact::Local),
        ..Request::default()
    };
    // No provider matches the derived keywords: the filter is bypassed and the
    // search still runs over the whole catalog
    let results = matcher.find_matches(&request, &opts()).await.unwrap();
    assert_result_invariants(&results);
    assert!(!results.is_empty());
    assert_eq!(results[0].provider_id, "P-GARDE-1");
}

#[tokio::test]
async fn unrelated_request_returns_nothing_or_low_confidence() {
    let matcher = matcher_with(vec![
        provider(
            "P-GARDE-1",
            "Garde Express",
            "garde, enfant, crèche",
            "24/7",
            "garde d'enfants à domicile",
            Some("Paris"),
        ),
        provider(
            "P-BANQUE-1",
            "Banque Azur",
            "banque, crédit, prêt immobilier",
            "En ligne",
            "prêts immobiliers",
            None,
        ),
    ])
    .await;

    let request = Request {
        message: "réparer mon vaisseau spatial intergalactique".into(),
        impact_geo: Some(GeoImpact::Local),
        ..Request::default()
    };
    let results = matcher.find_matches(&request, &opts()).await.unwrap();
    assert_result_invariants(&results);

    // Either nothing, or a single hit flagged as needing verification
    assert!(results.len() <= 1);
    if let Some(only) = results.first() {
        assert_eq!(only.confidence, Confidence::ToVerify);
        assert!(only.score >= 0.30);
    }
}
