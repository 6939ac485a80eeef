//! Hard domain pre-filtering over provider expertise strings
//!
//! Two static rule tables keyed by normalized sub-category phrase: required
//! keyword sets (a provider must carry at least K of them) and incompatible
//! keyword prefixes (a single hit rejects the provider). Every comparison runs
//! on normalized strings, so the tables below are stored accent-free.

use crate::text::normalize;

/// Sub-category -> keywords that must appear in the provider expertise.
/// The first key overlapping the request sub-category (substring either way) wins.
static REQUIRED_KEYWORDS: &[(&str, &[&str])] = &[
    // Famille - Garde
    ("garde d'enfant", &["garde", "enfant", "famille", "babysitting", "creche", "nounou"]),
    ("creche ou nounou", &["garde", "enfant", "famille", "creche", "nounou"]),
    ("scolarite", &["famille", "scolarite", "education", "ecole"]),
    ("activites periscolaires", &["famille", "loisirs", "sport", "activites", "enfant"]),
    ("aide aux devoirs", &["famille", "education", "soutien", "scolaire"]),
    ("garde animaux", &["animaux", "garde", "pension", "chien", "chat"]),
    // Travaux et Urgences
    ("plomberie urgente", &["plomberie", "travaux", "urgence", "depannage"]),
    ("electromenager", &["electromenager", "reparation", "depannage"]),
    ("mise en conformite logement", &["travaux", "electricite", "conformite"]),
    ("renovation avant vente", &["travaux", "renovation"]),
    ("installation fibre", &["travaux", "installation", "internet", "telecom"]),
    // Véhicule
    ("controle technique", &["vehicule", "auto", "controle", "technique", "automobile"]),
    ("location courte duree", &["location", "vehicule", "auto", "voiture", "automobile"]),
    ("achat vehicule", &["vehicule", "auto", "vente", "occasion", "automobile", "voiture"]),
    ("reprogrammation moteur", &["vehicule", "auto", "garage", "mecanique", "moteur"]),
    // Car context wins over the travaux reading for this phrase
    (
        "reparation urgente",
        &["garage", "auto", "vehicule", "reparation", "depannage", "mecanique", "automobile", "panne"],
    ),
    // Logement
    (
        "location meublee",
        &["logement", "location", "immobilier", "appartement", "meuble", "habitation"],
    ),
    (
        "recherche colocation",
        &["logement", "colocation", "location", "appartement", "colocataire"],
    ),
    ("recherche logement social", &["logement", "location", "immobilier", "social", "hlm"]),
    ("demenagement", &["demenagement", "transport", "logistique", "demenage", "demenageur"]),
    ("stockage temporaire", &["stockage", "garde-meuble", "entreposage", "box"]),
    ("etat des lieux", &["logement", "immobilier", "huissier", "juridique", "etat", "constat"]),
    (
        "construction maison retraite",
        &["construction", "immobilier", "batiment", "maison", "promoteur"],
    ),
    // Banque et Finance
    ("pret immobilier", &["banque", "finance", "credit", "pret", "immobilier"]),
    ("pret travaux", &["banque", "finance", "credit", "pret"]),
    ("regroupement credits", &["banque", "finance", "credit"]),
    ("placement financier", &["finance", "banque", "epargne", "investissement", "placement"]),
    // Assurance
    ("assurance habitation", &["assurance", "habitation", "logement"]),
    ("assurance auto jeune conducteur", &["assurance", "auto", "vehicule"]),
    ("mutuelle sante", &["assurance", "mutuelle", "sante"]),
    ("prevoyance", &["assurance", "prevoyance"]),
    // Administratif
    ("carte grise", &["administratif", "carte", "vehicule", "demarches"]),
    ("passeport express", &["administratif", "passeport", "demarches", "papiers"]),
    ("titre de sejour conjoint", &["administratif", "demarches", "juridique"]),
    ("changement situation familiale", &["administratif", "juridique", "demarches"]),
    // Santé
    ("dentiste d'urgence", &["sante", "dentiste", "dentaire", "urgence"]),
    ("kine urgence", &["sante", "kine", "kinesitherapie", "reeducation"]),
    ("ophtalmologue", &["sante", "ophtalmologue", "vision", "lunettes"]),
    ("accompagnement familial", &["sante", "psychologue", "accompagnement", "famille"]),
    ("gestion stress operationnel", &["sante", "psychologue", "stress", "accompagnement"]),
    // Emploi et Formation
    ("recherche emploi conjoint", &["emploi", "travail", "recrutement", "job"]),
    ("reconversion professionnelle", &["formation", "reconversion", "emploi"]),
    ("bilan de competences", &["emploi", "formation", "bilan", "orientation"]),
    ("aide a la creation entreprise", &["entreprise", "creation", "conseil", "accompagnement"]),
    ("preparation retraite", &["retraite", "conseil", "finance", "accompagnement"]),
    ("permis poids lourd", &["formation", "permis", "conduite"]),
    ("langue etrangere", &["formation", "langue", "cours", "apprentissage"]),
    // Services Express
    ("transport express", &["transport", "livraison", "coursier", "urgence"]),
    ("coiffure", &["coiffure", "beaute", "esthetique"]),
    ("pressing express", &["pressing", "nettoyage", "blanchisserie"]),
];

/// Sub-category prefix -> expertise keyword prefixes that disqualify a provider.
/// Every key found inside the request sub-category contributes its exclusions.
static INCOMPATIBLE_DOMAINS: &[(&str, &[&str])] = &[
    // Logement: exclude travaux / repairs / automotive
    (
        "location",
        &["electri", "electro", "plomb", "garage", "mecan", "controle", "vehicule", "auto", "depann", "repara", "travaux"],
    ),
    (
        "colocation",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "travaux", "depann", "repara"],
    ),
    (
        "logement",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "mecan", "depann", "repara"],
    ),
    (
        "meublee",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "depann", "travaux"],
    ),
    (
        "immobilier",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "depann", "repara"],
    ),
    // Famille: exclude technical trades
    (
        "garde",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "travaux", "construction", "depann", "repara"],
    ),
    (
        "enfant",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "travaux", "depann", "repara"],
    ),
    (
        "scolarite",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "travaux", "stockage", "entrepo"],
    ),
    (
        "ecole",
        &["electri", "electro", "plomb", "garage", "vehicule", "auto", "stockage", "travaux"],
    ),
    // Véhicule: exclude housing / family
    (
        "vehicule",
        &["logement", "location", "colocation", "garde", "enfant", "creche", "nounou", "stockage", "immobilier"],
    ),
    (
        "auto",
        &["logement", "location", "colocation", "garde", "enfant", "creche", "stockage", "immobilier"],
    ),
    ("panne", &["logement", "location", "garde", "enfant", "stockage", "immobilier"]),
    ("reparation", &["logement", "location", "garde", "stockage", "immobilier", "banque"]),
    ("garage", &["logement", "location", "colocation", "garde", "enfant", "immobilier"]),
    // Banque: exclude technical trades
    (
        "pret",
        &["electri", "electro", "plomb", "garage", "vehicule", "mecan", "travaux", "depann"],
    ),
    ("credit", &["electri", "electro", "plomb", "garage", "vehicule", "mecan", "depann"]),
    ("banque", &["electri", "electro", "plomb", "garage", "vehicule", "travaux", "depann"]),
    // Travaux: exclude tertiary services
    (
        "plomberie",
        &["logement", "location", "garde", "enfant", "banque", "finance", "assurance", "immobilier"],
    ),
    (
        "electricite",
        &["logement", "location", "garde", "enfant", "banque", "finance", "assurance", "immobilier"],
    ),
];

/// High-ambiguity sub-category prefixes that require two keyword matches
/// instead of one.
static STRICT_PREFIXES: &[&str] = &[
    "location",
    "logement",
    "colocation",
    "scolarite",
    "pret",
    "credit",
    "banque",
];

/// Resolved filtering rule for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRule {
    /// Keywords the provider expertise must contain
    pub keywords: Vec<String>,
    /// Substrings that disqualify a provider outright
    pub exclusions: Vec<String>,
    /// Minimum number of keyword hits (1, or 2 for high-ambiguity categories)
    pub min_keyword_matches: usize,
}

/// Build the filtering rule for a (category, sub-category) pair.
///
/// Returns `None` when no keyword set can be determined, in which case the
/// filter does not apply and the whole catalog stays eligible.
pub fn build_rule(category: Option<&str>, sub_category: Option<&str>) -> Option<DomainRule> {
    let sub_norm = normalize(sub_category.unwrap_or(""));

    let mut keywords: Vec<String> = Vec::new();
    if !sub_norm.is_empty() {
        for (key, values) in REQUIRED_KEYWORDS {
            if sub_norm.contains(key) || key.contains(sub_norm.as_str()) {
                keywords = values.iter().map(|k| (*k).to_string()).collect();
                break;
            }
        }
    }

    // No table hit: derive keywords from the longer words of the sub-category,
    // then the category
    if keywords.is_empty() {
        keywords = derive_keywords(sub_category);
    }
    if keywords.is_empty() {
        keywords = derive_keywords(category);
    }
    if keywords.is_empty() {
        return None;
    }

    let mut exclusions: Vec<String> = Vec::new();
    for (key, excluded) in INCOMPATIBLE_DOMAINS {
        if sub_norm.contains(key) {
            for word in excluded.iter() {
                if !exclusions.iter().any(|e| e == word) {
                    exclusions.push((*word).to_string());
                }
            }
        }
    }

    let strict = STRICT_PREFIXES.iter().any(|p| sub_norm.contains(p));
    Some(DomainRule {
        keywords,
        exclusions,
        min_keyword_matches: if strict { 2 } else { 1 },
    })
}

/// Words longer than four characters, normalized.
fn derive_keywords(phrase: Option<&str>) -> Vec<String> {
    let Some(phrase) = phrase else {
        return Vec::new();
    };
    normalize(phrase)
        .split_whitespace()
        .filter(|w| w.chars().count() > 4)
        .map(str::to_string)
        .collect()
}

/// Whether a provider expertise string satisfies the rule: no forbidden
/// substring, and at least `min_keyword_matches` required keywords.
pub fn provider_passes(rule: &DomainRule, expertise: &str) -> bool {
    let expertise = normalize(expertise);
    if expertise.is_empty() {
        return false;
    }
    if rule.exclusions.iter().any(|e| expertise.contains(e.as_str())) {
        return false;
    }
    let matched = rule
        .keywords
        .iter()
        .filter(|k| expertise.contains(k.as_str()))
        .count();
    matched >= rule.min_keyword_matches
}
