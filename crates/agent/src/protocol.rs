// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent subprocess wire protocol.
//!
//! One JSON object per stdout line. Unknown fields are tolerated and
//! preserved in `extra`; unknown event types and malformed lines are the
//! caller's anomaly to count. Stderr is never parsed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Protocol parse errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event line: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty event line")]
    Empty,
}

/// Event types the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ToolStart,
    ToolEnd,
    Message,
    Anomaly,
    RunStart,
    StepStart,
    Session,
}

/// Tool descriptor on `tool_start`/`tool_end`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub input: ToolInput,
}

/// Tool input fields the supervisor inspects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    /// Patch text on edit tools; parsed for touched-file markers.
    #[serde(default, rename = "patchText", skip_serializing_if = "Option::is_none")]
    pub patch_text: Option<String>,
    /// Command line on bash tools; matched against the gate allowlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One validated protocol event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Epoch milliseconds stamped by the agent.
    pub ts: u64,
    #[serde(default, rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInfo>,
    /// Assistant text on `message` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured PR signal on `session` events.
    #[serde(default, rename = "prUrl", skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AgentEvent {
    /// Parse one stdout line.
    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::Empty);
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// The tool name, when this is a tool event.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_ref().map(|t| t.name.as_str())
    }

    /// Whether this event is an edit-tool start carrying patch text.
    pub fn patch_text(&self) -> Option<&str> {
        self.tool.as_ref().and_then(|t| t.input.patch_text.as_deref())
    }

    /// The bash command, when this is a bash tool start.
    pub fn bash_command(&self) -> Option<&str> {
        let tool = self.tool.as_ref()?;
        if tool.name != "bash" {
            return None;
        }
        tool.input.command.as_deref()
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
