// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue references and note-ref normalization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A hosting-service issue reference: `<owner>/<name>#<number>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueRef {
    pub owner: String,
    pub name: String,
    pub number: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid issue reference: {input:?} (expected <owner>/<name>#<n>)")]
pub struct ParseIssueRefError {
    pub input: String,
}

impl IssueRef {
    /// The `owner/name` repository slug.
    pub fn repo(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.name, self.number)
    }
}

impl FromStr for IssueRef {
    type Err = ParseIssueRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIssueRefError { input: s.to_string() };
        let (repo, number) = s.split_once('#').ok_or_else(err)?;
        let (owner, name) = repo.split_once('/').ok_or_else(err)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(err());
        }
        let number: u64 = number.parse().map_err(|_| err())?;
        Ok(Self { owner: owner.to_string(), name: name.to_string(), number })
    }
}

impl TryFrom<String> for IssueRef {
    type Error = ParseIssueRefError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IssueRef> for String {
    fn from(r: IssueRef) -> Self {
        r.to_string()
    }
}

/// Strip CR/LF anywhere and surrounding whitespace.
pub fn sanitize_note_ref(s: &str) -> String {
    let without_newlines: String = s.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    without_newlines.trim().to_string()
}

/// Normalize an external note reference to its bare form.
///
/// Sanitizes first (so normalization commutes with sanitization), then
/// strips `[[...]]` wiki-link wrappers until none remain, trimming between
/// layers.
pub fn normalize_note_ref(s: &str) -> String {
    let mut current = sanitize_note_ref(s);
    loop {
        let stripped = match current.strip_prefix("[[").and_then(|rest| rest.strip_suffix("]]")) {
            Some(inner) => inner.trim().to_string(),
            None => return current,
        };
        current = stripped;
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
