//! Resource matching logic.
//!
//! Resolves an inbound request to the most specific matching resource
//! configuration among the configured candidates.
//!
//! Matching runs in two phases: a predicate filter keeps every candidate
//! whose constraints are satisfied by the request, then specificity narrowing
//! progressively prefers candidates that explicitly constrain path params,
//! query params, and headers, in that fixed order. Ties go to the earliest
//! candidate in declaration order, with a warning.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{ResolvedResourceConfig, ResourceConfig};
use crate::exchange::RequestFacts;

/// Resource matcher.
///
/// Stateless and reentrant: a single shared instance serves any number of
/// concurrent requests over the immutable candidate set.
#[derive(Debug, Default)]
pub struct ResourceMatcher;

impl ResourceMatcher {
    /// Create a matcher.
    pub fn new() -> Self {
        Self
    }

    /// Search for a resource configuration matching the current request.
    ///
    /// Returns `None` when no candidate matches; the caller is responsible
    /// for its own fallback (default or not-found) response.
    pub fn select<'a>(
        &self,
        candidates: &'a [ResolvedResourceConfig],
        request: &RequestFacts,
    ) -> Option<&'a ResourceConfig> {
        let filtered: Vec<&ResolvedResourceConfig> = candidates
            .iter()
            .filter(|c| self.is_candidate_match(c, request))
            .collect();

        let surviving = narrow_by_specificity(filtered);

        match surviving.len() {
            0 => None,
            1 => {
                debug!(
                    path = %request.path,
                    method = %request.method,
                    resource = %surviving[0].config().path,
                    "Matched resource configuration"
                );
                Some(surviving[0].config())
            }
            n => {
                // Tie-break is first-in-declaration-order; candidates is a Vec
                // so iteration order is stable.
                warn!(
                    path = %request.path,
                    method = %request.method,
                    candidates = n,
                    resource = %surviving[0].config().path,
                    "More than one resource configuration matched; using the first"
                );
                Some(surviving[0].config())
            }
        }
    }

    fn is_candidate_match(&self, candidate: &ResolvedResourceConfig, request: &RequestFacts) -> bool {
        let config = candidate.config();

        // Path: exact concrete path, or the router's template when present.
        // Templates let one entry cover many concrete paths; the literal
        // comparison supports non-templated routes.
        let path_matched = request.path == config.path
            || request
                .route_template
                .as_deref()
                .is_some_and(|t| t == config.path);
        if !path_matched {
            return false;
        }

        // Method is case-exact when configured, wildcard otherwise.
        if let Some(method) = &config.method {
            if *method != request.method {
                return false;
            }
        }

        match_pairs(&request.path_params, candidate.path_params(), true)
            && match_pairs(&request.query_params, candidate.query_params(), true)
            && match_pairs(&request.headers, candidate.request_headers(), false)
            && match_body(request, config)
    }
}

/// Apply specificity narrowing in the fixed dimension order: path params,
/// then query params, then headers.
///
/// At each step the candidates that explicitly constrain the dimension
/// (non-empty map) displace those that do not; when nobody constrains it the
/// surviving set is left unchanged.
fn narrow_by_specificity(
    candidates: Vec<&ResolvedResourceConfig>,
) -> Vec<&ResolvedResourceConfig> {
    let by_path_params = narrow_one(candidates, |c| !c.path_params().is_empty());
    let by_query_params = narrow_one(by_path_params, |c| !c.query_params().is_empty());
    narrow_one(by_query_params, |c| !c.request_headers().is_empty())
}

fn narrow_one<'a>(
    candidates: Vec<&'a ResolvedResourceConfig>,
    constrains: impl Fn(&ResolvedResourceConfig) -> bool,
) -> Vec<&'a ResolvedResourceConfig> {
    let specific: Vec<&ResolvedResourceConfig> = candidates
        .iter()
        .copied()
        .filter(|c| constrains(c))
        .collect();

    if specific.is_empty() {
        candidates
    } else {
        specific
    }
}

/// Match configured key/value pairs against a request map.
///
/// An empty config map is a wildcard. A non-empty one matches when AT LEAST
/// ONE configured pair has an equal counterpart in the request - an
/// any-of-pairs semantic, deliberately preserved from the observable behavior
/// of existing configurations, not all-of-pairs.
fn match_pairs(
    request_map: &HashMap<String, String>,
    config_map: &HashMap<String, String>,
    case_sensitive_keys: bool,
) -> bool {
    if config_map.is_empty() {
        return true;
    }

    config_map.iter().any(|(key, expected)| {
        let actual = if case_sensitive_keys {
            request_map.get(key)
        } else {
            request_map
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        };
        actual == Some(expected)
    })
}

/// Evaluate a configured body predicate against the request body.
///
/// No predicate or an empty path expression is a wildcard. Otherwise the
/// path is evaluated over the body as JSON; an empty body or unresolvable
/// path yields null, and the result must null-safe-equal the expected value.
fn match_body(request: &RequestFacts, config: &ResourceConfig) -> bool {
    let Some(predicate) = &config.request_body else {
        return true;
    };
    let Some(expr) = predicate.json_path.as_deref().filter(|e| !e.is_empty()) else {
        return true;
    };

    let extracted = extract_body_value(request.body.as_deref(), expr);
    extracted == predicate.value
}

fn extract_body_value(body: Option<&str>, expr: &str) -> serde_json::Value {
    use jsonpath_rust::JsonPath;

    let Some(body) = body.filter(|b| !b.is_empty()) else {
        return serde_json::Value::Null;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return serde_json::Value::Null;
    };
    let Ok(path) = JsonPath::try_from(expr) else {
        return serde_json::Value::Null;
    };

    // The path engine returns an array of matches; the extracted value is the
    // first match, or null when nothing resolved.
    match path.find(&json) {
        serde_json::Value::Array(matches) => {
            matches.into_iter().next().unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Null => serde_json::Value::Null,
        other => other,
    }
}
