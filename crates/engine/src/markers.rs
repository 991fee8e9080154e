// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review decision markers.
//!
//! Review agents communicate decisions through two small grammars, never
//! through fuzzy phrasing: line-start gap markers (`PRODUCT GAP:` /
//! `NO PRODUCT GAP:`) and a routing decision block (JSON in a fenced code
//! block under a fixed heading, or a strict final-line sentinel). Parsing
//! returns a sum type; absence is never conflated with malformation.

use serde::{Deserialize, Serialize};

/// Heading that introduces a routing decision block.
const DECISION_HEADING: &str = "## Decision";
/// Final-line sentinel alternative, e.g. `DECISION: approve`.
const DECISION_SENTINEL: &str = "DECISION:";

/// Result of scanning for a gap marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapMarker {
    /// `PRODUCT GAP:` at line start.
    Gap,
    /// `NO PRODUCT GAP:` at line start.
    NoGap,
    /// Neither marker present.
    NotFound,
}

impl GapMarker {
    pub fn has_gap(&self) -> Option<bool> {
        match self {
            GapMarker::Gap => Some(true),
            GapMarker::NoGap => Some(false),
            GapMarker::NotFound => None,
        }
    }
}

/// Scan text for the product-gap marker. Only line-start markers count;
/// the last marker line wins.
pub fn parse_product_gap(text: &str) -> GapMarker {
    let mut found = GapMarker::NotFound;
    for line in text.lines() {
        let line = line.trim_start();
        // Negation first: "NO PRODUCT GAP:" also starts with neither
        // prefix of the positive marker, but keep the order explicit.
        if line.starts_with("NO PRODUCT GAP:") {
            found = GapMarker::NoGap;
        } else if line.starts_with("PRODUCT GAP:") {
            found = GapMarker::Gap;
        }
    }
    found
}

/// The routing verdict of a review gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingVerdict {
    Approve,
    Revise,
    Reject,
}

impl RoutingVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingVerdict::Approve => "approve",
            RoutingVerdict::Revise => "revise",
            RoutingVerdict::Reject => "reject",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "approve" => Some(RoutingVerdict::Approve),
            "revise" => Some(RoutingVerdict::Revise),
            "reject" => Some(RoutingVerdict::Reject),
            _ => None,
        }
    }
}

/// A structured review routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub verdict: RoutingVerdict,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Routing decision parse result. `NotFound` and `Malformed` are distinct
/// outcomes with distinct worker policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingParse {
    Found(RoutingDecision),
    NotFound,
    Malformed(String),
}

/// Parse a routing decision from review output.
///
/// Grammar, in precedence order:
/// 1. A fenced ```json block directly under the `## Decision` heading.
/// 2. A strict final-line sentinel `DECISION: <verdict>`.
pub fn parse_routing_decision(text: &str) -> RoutingParse {
    if let Some(result) = parse_decision_block(text) {
        return result;
    }
    parse_decision_sentinel(text)
}

fn parse_decision_block(text: &str) -> Option<RoutingParse> {
    let mut lines = text.lines();
    // Find the heading
    loop {
        let line = lines.next()?;
        if line.trim() == DECISION_HEADING {
            break;
        }
    }
    // The next non-empty line must open a json fence
    let fence_open = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line.trim().to_string(),
            None => {
                return Some(RoutingParse::Malformed(
                    "decision heading with no block".to_string(),
                ))
            }
        }
    };
    if fence_open != "```json" && fence_open != "```" {
        return Some(RoutingParse::Malformed(format!(
            "expected fenced block after heading, found {fence_open:?}"
        )));
    }
    let mut body = String::new();
    for line in lines {
        if line.trim() == "```" {
            return Some(match serde_json::from_str::<RoutingDecision>(&body) {
                Ok(decision) => RoutingParse::Found(decision),
                Err(e) => RoutingParse::Malformed(format!("decision JSON: {e}")),
            });
        }
        body.push_str(line);
        body.push('\n');
    }
    Some(RoutingParse::Malformed("unterminated decision block".to_string()))
}

fn parse_decision_sentinel(text: &str) -> RoutingParse {
    let last = match text.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => line.trim(),
        None => return RoutingParse::NotFound,
    };
    let Some(rest) = last.strip_prefix(DECISION_SENTINEL) else {
        return RoutingParse::NotFound;
    };
    let word = rest.trim();
    match RoutingVerdict::from_word(word) {
        Some(verdict) => RoutingParse::Found(RoutingDecision { verdict, reasons: Vec::new() }),
        None => RoutingParse::Malformed(format!("unknown verdict {word:?}")),
    }
}

/// Render a decision in the canonical block form.
///
/// `parse_routing_decision(render_routing_decision(d))` returns `d`.
pub fn render_routing_decision(decision: &RoutingDecision) -> String {
    let json = serde_json::to_string_pretty(decision).unwrap_or_else(|_| "{}".to_string());
    format!("{DECISION_HEADING}\n\n```json\n{json}\n```\n")
}

#[cfg(test)]
#[path = "markers_tests.rs"]
mod tests;
