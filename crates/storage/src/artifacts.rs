// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact truncation policy.
//!
//! Content is bounded per kind before it reaches the store; the original
//! length is recorded so nothing is silently rewritten.

use serde::{Deserialize, Serialize};

/// Version stamped on every stored artifact.
pub const ARTIFACT_POLICY_VERSION: u32 = 1;

/// Which end of the content survives truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationMode {
    Head,
    Tail,
}

impl TruncationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TruncationMode::Head => "head",
            TruncationMode::Tail => "tail",
        }
    }
}

impl std::str::FromStr for TruncationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(TruncationMode::Head),
            "tail" => Ok(TruncationMode::Tail),
            other => Err(format!("unknown truncation mode: {other:?}")),
        }
    }
}

/// Per-kind truncation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactPolicy {
    pub max_chars: usize,
    pub mode: TruncationMode,
}

impl ArtifactPolicy {
    /// Policy for an artifact kind. CI logs keep their tail (failures live
    /// at the end); everything else keeps its head.
    pub fn for_kind(kind: &str) -> Self {
        match kind {
            "failure_excerpt" => Self { max_chars: 20_000, mode: TruncationMode::Tail },
            "note" => Self { max_chars: 4_000, mode: TruncationMode::Head },
            _ => Self { max_chars: 8_000, mode: TruncationMode::Head },
        }
    }
}

/// Result of applying a truncation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedContent {
    pub content: String,
    pub truncated: bool,
    pub mode: TruncationMode,
    pub original_chars: u64,
    pub original_lines: u64,
}

/// Apply the policy for `kind` to `content`.
pub fn truncate_for_kind(kind: &str, content: &str) -> TruncatedContent {
    let policy = ArtifactPolicy::for_kind(kind);
    let original_chars = content.chars().count();
    let original_lines = if content.is_empty() { 0 } else { content.lines().count() };
    if original_chars <= policy.max_chars {
        return TruncatedContent {
            content: content.to_string(),
            truncated: false,
            mode: policy.mode,
            original_chars: original_chars as u64,
            original_lines: original_lines as u64,
        };
    }
    let kept: String = match policy.mode {
        TruncationMode::Head => content.chars().take(policy.max_chars).collect(),
        TruncationMode::Tail => {
            let skip = original_chars - policy.max_chars;
            content.chars().skip(skip).collect()
        }
    };
    TruncatedContent {
        content: kept,
        truncated: true,
        mode: policy.mode,
        original_chars: original_chars as u64,
        original_lines: original_lines as u64,
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
