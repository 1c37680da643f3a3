//! Lenient parsing of line-oriented CLI listings
//!
//! Lines with too few tokens, or lacking the caller's selector substring,
//! are skipped rather than rejected: CLI output varies across tool
//! versions and may carry warnings or banners.

use indexmap::IndexMap;
use tracing::debug;

use crate::types::{NodeRecord, PodRecord};

/// Tokens needed for a node line: name, ip
pub const NODE_FIELDS: usize = 2;
/// Tokens needed for a pod line: name, namespace, node
pub const POD_FIELDS: usize = 3;
/// Tokens needed for a network attachment line: name
pub const NETWORK_FIELDS: usize = 1;

/// Split accepted lines into tokens.
///
/// A line is accepted when it has at least `min_fields` whitespace
/// separated tokens and, if `selector` is non-empty, contains it.
pub fn accepted_lines<'a>(
    raw: &'a str,
    min_fields: usize,
    selector: &'a str,
) -> impl Iterator<Item = Vec<&'a str>> + 'a {
    raw.lines().filter_map(move |line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return None;
        }
        if tokens.len() < min_fields {
            debug!(line, min_fields, "skipping short line");
            return None;
        }
        if !selector.is_empty() && !line.contains(selector) {
            debug!(line, selector, "skipping line without selector");
            return None;
        }
        Some(tokens)
    })
}

/// Placeholder `custom-columns` prints for a missing field
pub const MISSING_FIELD: &str = "<none>";

/// Parse a node listing, keyed by node name
///
/// Nodes without a reported address are skipped.
#[must_use]
pub fn parse_nodes(raw: &str, selector: &str) -> IndexMap<String, NodeRecord> {
    accepted_lines(raw, NODE_FIELDS, selector)
        .filter(|t| {
            let missing = t[..NODE_FIELDS].contains(&MISSING_FIELD);
            if missing {
                debug!(node = t[0], "skipping node without address");
            }
            !missing
        })
        .map(|t| {
            let record = NodeRecord {
                name: t[0].to_string(),
                ip: t[1].to_string(),
            };
            (record.name.clone(), record)
        })
        .collect()
}

/// Parse a pod listing, keyed by `(namespace, name)`
#[must_use]
pub fn parse_pods(raw: &str) -> IndexMap<(String, String), PodRecord> {
    accepted_lines(raw, POD_FIELDS, "")
        .map(|t| {
            let record = PodRecord {
                name: t[0].to_string(),
                namespace: t[1].to_string(),
                node: t[2].to_string(),
            };
            ((record.namespace.clone(), record.name.clone()), record)
        })
        .collect()
}

/// Parse a network attachment listing, preserving order
#[must_use]
pub fn parse_networks(raw: &str) -> Vec<String> {
    accepted_lines(raw, NETWORK_FIELDS, "")
        .map(|t| t[0].to_string())
        .collect()
}
