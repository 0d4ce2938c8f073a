//! Severity, description and reason derivation for finalized incidents.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ActionEntry, AlertSeverity};

pub const DEFAULT_REASON: &str = "Rule violation detected";

/// Ordered content classifiers; the first match labels the incident.
static REASON_CLASSIFIERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let table = [
        (
            "Spam content",
            r"(?i)\b(free\s+nitro|buy|sell|cheap|discount|promo(tion)?|giveaway|subscribe|click\s+here|limited\s+offer)\b",
        ),
        (
            "Suspicious links",
            r"(?i)(https?://|www\.|discord\.gg/|\b[a-z0-9-]+\.(com|net|org|gg|io|xyz|ru)\b)",
        ),
        ("Mass mentions", r"(?s)@everyone|@here|(<@[!&]?\d+>.*?){5}"),
        ("Excessive caps", r"[A-Z]{10,}"),
        (
            "Profanity",
            r"(?i)\b(fuck|shit|bitch|asshole|bastard|cunt|dick)\w*",
        ),
    ];

    table
        .into_iter()
        .filter_map(|(label, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some((label, regex)),
            Err(e) => {
                tracing::error!(label = label, error = %e, "Invalid reason classifier");
                None
            }
        })
        .collect()
});

/// Label the content with the first matching classifier
pub fn classify_reason(content: &str) -> &'static str {
    REASON_CLASSIFIERS
        .iter()
        .find(|(_, regex)| regex.is_match(content))
        .map(|(label, _)| *label)
        .unwrap_or(DEFAULT_REASON)
}

/// `High` when any timeout was applied, otherwise `Medium`
pub fn severity_for(actions: &[ActionEntry]) -> AlertSeverity {
    if actions.iter().any(|a| a.kind.is_timeout()) {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

/// Unique action phrases joined in observation order
pub fn describe_actions(actions: &[ActionEntry]) -> String {
    let mut phrases: Vec<&str> = Vec::with_capacity(actions.len());
    for action in actions {
        let phrase = action.kind.phrase();
        if !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
    }
    phrases.join(", ")
}
