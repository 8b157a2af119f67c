//! Canonical type definitions for the session-state core
//!
//! This module is the single source of truth for the types shared between the
//! registry, the artifact extractor, and the persistence mirror, so that the
//! rendering and transport layers agree on one vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Normal assistant conversation
    #[default]
    Assistant,
    /// Raw shell passthrough (no assistant in the loop)
    RawShell,
}

impl SessionMode {
    /// Get display label for this mode
    pub fn label(&self) -> &'static str {
        match self {
            Self::Assistant => "Assistant",
            Self::RawShell => "Raw Shell",
        }
    }
}

impl From<&str> for SessionMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "raw-shell" | "shell" => Self::RawShell,
            _ => Self::Assistant,
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assistant => write!(f, "assistant"),
            Self::RawShell => write!(f, "raw-shell"),
        }
    }
}

/// Message role (user, assistant, tool, system)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

/// A finalized message in a session's transcript
///
/// Immutable once created; duplicate ids are silently ignored on append so
/// at-least-once delivery from the transport never doubles a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    /// Freestanding reasoning buffer from records that predate segment storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Ordered turn segments (text, tools, reasoning) in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<TurnSegment>,
}

impl Message {
    pub fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
            reasoning: None,
            segments: Vec::new(),
        }
    }

    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::User, content)
    }

    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::Assistant, content)
    }

    /// Segments in canonical replay order (reasoning first)
    pub fn replay_segments(&self) -> Vec<TurnSegment> {
        replay_order(&self.segments, self.reasoning.as_deref())
    }
}

/// Status of a tool invocation
///
/// Transitions only move forward: `Running -> Success` or `Running -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Success,
    Error,
}

/// One tool invocation tracked by `tool_call_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolRecord {
    /// Create a record for a freshly started invocation
    pub fn running(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Option<serde_json::Value>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            status: ToolStatus::Running,
            result: None,
            error: None,
        }
    }

    /// Merge a partial update into this record
    ///
    /// Only fields present in the patch are written, so a `result` arriving
    /// after a status flip is never lost. A terminal status never reverts to
    /// `Running`.
    pub fn apply(&mut self, patch: &ToolRecordPatch) {
        if let Some(status) = patch.status {
            let reverting = self.status != ToolStatus::Running && status == ToolStatus::Running;
            if !reverting {
                self.status = status;
            }
        }
        if let Some(arguments) = &patch.arguments {
            self.arguments = Some(arguments.clone());
        }
        if let Some(result) = &patch.result {
            self.result = Some(result.clone());
        }
        if let Some(error) = &patch.error {
            self.error = Some(error.clone());
        }
    }
}

/// Partial update for a tool record; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolRecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolRecordPatch {
    pub fn status(status: ToolStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn completed(result: impl Into<String>) -> Self {
        Self {
            status: Some(ToolStatus::Success),
            result: Some(result.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ToolStatus::Error),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// One ordered unit of a turn's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TurnSegment {
    Text { content: String },
    Tool(ToolRecord),
    Reasoning { content: String },
}

impl TurnSegment {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn reasoning(content: impl Into<String>) -> Self {
        Self::Reasoning {
            content: content.into(),
        }
    }
}

/// Derive the canonical replay order for a finalized segment sequence
///
/// Reasoning segments come first, then the remaining segments in their
/// original arrival order. When no reasoning segment exists but a legacy
/// freestanding buffer does, the buffer becomes one implicit reasoning
/// segment at the front; segment-tagged reasoning always wins over the
/// buffer, so both paths never contribute for the same message.
pub fn replay_order(segments: &[TurnSegment], legacy_reasoning: Option<&str>) -> Vec<TurnSegment> {
    let mut ordered: Vec<TurnSegment> = Vec::with_capacity(segments.len() + 1);
    let mut rest: Vec<TurnSegment> = Vec::new();

    for segment in segments {
        match segment {
            TurnSegment::Reasoning { .. } => ordered.push(segment.clone()),
            other => rest.push(other.clone()),
        }
    }

    if ordered.is_empty() {
        if let Some(buffer) = legacy_reasoning {
            if !buffer.is_empty() {
                ordered.push(TurnSegment::reasoning(buffer));
            }
        }
    }

    ordered.extend(rest);
    ordered
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

/// A tracked task surfaced in a session's side panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn queued(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Queued,
            created_at: Utc::now(),
        }
    }
}

/// A request for user input raised mid-turn by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputRequest {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_mode_roundtrip() {
        assert_eq!(SessionMode::from("raw-shell"), SessionMode::RawShell);
        assert_eq!(SessionMode::from("assistant"), SessionMode::Assistant);
        assert_eq!(SessionMode::from("garbage"), SessionMode::Assistant);
        assert_eq!(SessionMode::RawShell.to_string(), "raw-shell");
    }

    #[test]
    fn test_tool_record_partial_merge() {
        let mut record = ToolRecord::running("tc1", "bash", None);
        record.apply(&ToolRecordPatch::status(ToolStatus::Success));
        record.apply(&ToolRecordPatch {
            result: Some("output".to_string()),
            ..Default::default()
        });

        assert_eq!(record.status, ToolStatus::Success);
        assert_eq!(record.result.as_deref(), Some("output"));
        assert_eq!(record.tool_name, "bash");
    }

    #[test]
    fn test_tool_status_never_reverts() {
        let mut record = ToolRecord::running("tc1", "bash", None);
        record.apply(&ToolRecordPatch::completed("done"));
        record.apply(&ToolRecordPatch::status(ToolStatus::Running));
        assert_eq!(record.status, ToolStatus::Success);
    }

    #[test]
    fn test_replay_order_reasoning_first() {
        let segments = vec![
            TurnSegment::Tool(ToolRecord::running("tc1", "bash", None)),
            TurnSegment::reasoning("think"),
            TurnSegment::text("answer"),
        ];

        let ordered = replay_order(&segments, None);
        assert_eq!(ordered.len(), 3);
        assert!(matches!(ordered[0], TurnSegment::Reasoning { .. }));
        assert!(matches!(ordered[1], TurnSegment::Tool(_)));
        assert!(matches!(ordered[2], TurnSegment::Text { .. }));
    }

    #[test]
    fn test_replay_order_legacy_buffer_fallback() {
        let segments = vec![TurnSegment::text("answer")];
        let ordered = replay_order(&segments, Some("old thinking"));
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0], TurnSegment::reasoning("old thinking"));
    }

    #[test]
    fn test_replay_order_segments_win_over_legacy_buffer() {
        let segments = vec![
            TurnSegment::reasoning("tagged"),
            TurnSegment::text("answer"),
        ];
        let ordered = replay_order(&segments, Some("stale buffer"));
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0], TurnSegment::reasoning("tagged"));
    }

    #[test]
    fn test_replay_order_empty_legacy_buffer_ignored() {
        let ordered = replay_order(&[TurnSegment::text("hi")], Some(""));
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn test_segment_serde_tagging() {
        let segment = TurnSegment::text("hello");
        let json = serde_json::to_string(&segment).unwrap();
        assert!(json.contains("\"type\":\"text\""));

        let tool = TurnSegment::Tool(ToolRecord::running("tc1", "bash", None));
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("\"type\":\"tool\""));
        assert!(json.contains("\"status\":\"running\""));
    }

    #[test]
    fn test_message_replay_segments() {
        let mut message = Message::assistant("s1", "Done.");
        message.segments = vec![
            TurnSegment::Tool(ToolRecord::running("tc1", "bash", None)),
            TurnSegment::reasoning("why"),
        ];
        let ordered = message.replay_segments();
        assert!(matches!(ordered[0], TurnSegment::Reasoning { .. }));
    }
}
