//! Synthetic identifiers for merged cost query results.
//!
//! The merged result spans many scopes, so the identifying values of the first
//! scope are masked with `LIST`.

use crate::merger::tables::QUERY_RESOURCE_TYPE;
use regex::Regex;
use std::sync::LazyLock;

/// Ordered from most to least specific. The first matching rule wins.
const SCOPE_PATTERNS: &[(&str, &str)] = &[
    (
        r"(?i)(^|/)(subscriptions/)[^/]+(/resourceGroups/)[^/]+",
        "${1}${2}LIST${3}LIST",
    ),
    (r"(?i)(^|/)(subscriptions/)[^/]+", "${1}${2}LIST"),
    (
        r"(?i)(^|/)(billingAccounts/)[^/]+(/billingProfiles/)[^/]+(/invoiceSections/)[^/]+",
        "${1}${2}LIST${3}LIST${4}LIST",
    ),
    (
        r"(?i)(^|/)(billingAccounts/)[^/]+(/billingProfiles/)[^/]+",
        "${1}${2}LIST${3}LIST",
    ),
    (
        r"(?i)(^|/)(billingAccounts/)[^/]+(/customers/)[^/]+",
        "${1}${2}LIST${3}LIST",
    ),
    (
        r"(?i)(^|/)(billingAccounts/)[^/]+(/enrollmentAccounts/)[^/]+",
        "${1}${2}LIST${3}LIST",
    ),
    (r"(?i)(^|/)(billingAccounts/)[^/]+", "${1}${2}LIST"),
    (r"(?i)(^|/)(managementGroups/)[^/]+", "${1}${2}LIST"),
];

static SCOPE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SCOPE_PATTERNS
        .iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid regex"), *replacement))
        .collect()
});

/// Masks the identifying segments of `scope`. Unknown scope shapes are returned unchanged.
pub fn mask_scope(scope: &str) -> String {
    SCOPE_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(scope))
        .map(|(pattern, replacement)| pattern.replacen(scope, 1, *replacement).into_owned())
        .unwrap_or_else(|| scope.to_string())
}

/// Identifier of a merged cost query result.
///
/// Deterministic for a given scope and suffix; distinct suffixes give distinct ids.
pub fn synthetic_id(first_scope: &str, suffix: &str) -> String {
    let masked = mask_scope(first_scope);
    format!(
        "{}/providers/{QUERY_RESOURCE_TYPE}/{suffix}",
        masked.trim_end_matches('/')
    )
}
