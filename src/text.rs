//! Text normalization and embedding text surfaces
//!
//! Every keyword membership test and city comparison in the engine runs on
//! strings produced by [`normalize`]: lowercased, accent-stripped, whitespace
//! collapsed. The surface builders assemble the labeled " | "-joined texts fed
//! to the embedding backend; the provider city is deliberately left out of both
//! sides so geography only enters through the geo score.

use crate::catalog::Provider;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, NFD-decompose and drop combining marks, collapse whitespace runs, trim.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .replace('\u{2019}', "'")
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count comma-separated expertise tokens, skipping empty segments.
pub fn count_expertise_tokens(expertise: &str) -> usize {
    expertise
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .count()
}

/// Build the provider-side embedding surface.
///
/// City is excluded: geographic preference is handled by the geo score, and
/// leaking it into the embedding would bias semantic similarity.
pub fn provider_text(provider: &Provider) -> String {
    let mut parts = Vec::new();
    if !provider.name.is_empty() {
        parts.push(format!("Entreprise: {}", provider.name));
    }
    if !provider.expertise.is_empty() {
        parts.push(format!("Expertise: {}", provider.expertise));
    }
    if !provider.availability.is_empty() {
        parts.push(format!("Disponibilité: {}", provider.availability));
    }
    if !provider.description.is_empty() {
        parts.push(format!("Services: {}", provider.description));
    }
    parts.join(" | ")
}

/// Build the request-side embedding surface from structured fields.
///
/// Mirrors the provider surface; city is excluded here too.
pub fn request_text(
    category: Option<&str>,
    sub_category: Option<&str>,
    urgency: Option<&str>,
    message: &str,
) -> String {
    let mut parts = Vec::new();
    if let Some(cat) = category.filter(|s| !s.is_empty()) {
        parts.push(format!("Catégorie: {}", cat));
    }
    if let Some(sub) = sub_category.filter(|s| !s.is_empty()) {
        parts.push(format!("Sous-catégorie: {}", sub));
    }
    if !message.is_empty() {
        parts.push(format!("Message: {}", message));
    }
    if let Some(urg) = urgency.filter(|s| !s.is_empty()) {
        parts.push(format!("Urgence: {}", urg));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_case() {
        assert_eq!(normalize("Prêt Immobilier"), "pret immobilier");
        assert_eq!(normalize("GARDE  D'ENFANT"), "garde d'enfant");
        assert_eq!(normalize("Saint-Étienne"), "saint-etienne");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  crèche \t ou\n nounou  "), "creche ou nounou");
    }

    #[test]
    fn normalize_handles_curly_apostrophe() {
        assert_eq!(normalize("aujourd\u{2019}hui"), "aujourd'hui");
    }

    #[test]
    fn expertise_token_count_skips_empty_segments() {
        assert_eq!(count_expertise_tokens("plomberie, travaux, urgence"), 3);
        assert_eq!(count_expertise_tokens("banque,, finance, "), 2);
        assert_eq!(count_expertise_tokens(""), 0);
    }

    #[test]
    fn provider_surface_excludes_city() {
        let p = Provider {
            id: "P1".into(),
            name: "Allo Dépannage".into(),
            expertise: "plomberie, urgence".into(),
            availability: "24/7".into(),
            description: "Interventions rapides".into(),
            city: Some("Lyon".into()),
        };
        let text = provider_text(&p);
        assert_eq!(
            text,
            "Entreprise: Allo Dépannage | Expertise: plomberie, urgence | \
             Disponibilité: 24/7 | Services: Interventions rapides"
        );
        assert!(!text.contains("Lyon"));
    }

    #[test]
    fn request_surface_skips_missing_fields() {
        let text = request_text(None, Some("Garde d'enfant"), None, "besoin de garde");
        assert_eq!(
            text,
            "Sous-catégorie: Garde d'enfant | Message: besoin de garde"
        );
    }
}
