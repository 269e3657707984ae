//! Deterministic keyword classification of document types into [`Impact`].
//!
//! Rules are checked from highest impact down; the first rule with a matching
//! token wins. Polish stems match inflected forms ("ustawa", "ustawy",
//! "ustawą"); English words must match a whole token.

use crate::models::Impact;

struct ImpactRule {
    impact: Impact,
    stems: &'static [&'static str],
    words: &'static [&'static str],
}

const RULES: &[ImpactRule] = &[
    ImpactRule {
        impact: Impact::High,
        stems: &["ustaw", "konstytuc", "kodeks", "ratyfik"],
        words: &["act", "acts", "constitution", "statute", "code"],
    },
    ImpactRule {
        impact: Impact::Medium,
        stems: &["rozporządz", "rozporzadz", "dekret", "zarządz", "zarzadz"],
        words: &["decree", "regulation", "ordinance", "directive"],
    },
];

/// Classify a document type string. Anything unrecognised is [`Impact::Low`].
pub fn classify_impact(document_type: &str) -> Impact {
    let lowered = document_type.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for rule in RULES {
        let hit = tokens.iter().any(|token| {
            rule.stems.iter().any(|stem| token.starts_with(stem)) || rule.words.contains(token)
        });
        if hit {
            return rule.impact;
        }
    }
    Impact::Low
}
