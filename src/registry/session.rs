//! Per-session state and turn accumulation
//!
//! Handles:
//! - Streaming buffer accumulation (text and reasoning, append-only)
//! - In-flight tool tracking by `tool_call_id` (insert-or-merge)
//! - Ordered turn-segment collection in raw arrival order
//! - Transcript, artifact, and task bookkeeping for one tab
//!
//! All mutation goes through these methods; direct field assignment would
//! bypass the append-only and dedup invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::Artifact;
use crate::core::types::{
    Message, SessionMode, Task, ToolRecord, ToolRecordPatch, TurnSegment, UserInputRequest,
};
use crate::core::usage::UsageCounters;

/// One open conversation tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable tab identity, generated independently of the conversation
    pub id: String,
    /// Bound server-side conversation record; `None` for drafts
    pub conversation_id: Option<String>,
    pub title: String,
    pub mode: SessionMode,
    pub messages: Vec<Message>,
    pub streaming_text: String,
    pub is_streaming: bool,
    pub tool_records: Vec<ToolRecord>,
    pub reasoning_text: String,
    pub turn_segments: Vec<TurnSegment>,
    pub last_error: Option<String>,
    pub messages_loaded: bool,
    pub created_at: DateTime<Utc>,
    pub usage: UsageCounters,
    pub plan_mode: bool,
    pub plan_complete_prompt: bool,
    pub pending_user_input: Option<UserInputRequest>,
    pub artifacts: Vec<Artifact>,
    pub active_artifact_id: Option<String>,
    pub artifacts_panel_open: bool,
    pub tasks: Vec<Task>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        conversation_id: Option<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id,
            title: title.into(),
            mode: SessionMode::default(),
            messages: Vec::new(),
            streaming_text: String::new(),
            is_streaming: false,
            tool_records: Vec::new(),
            reasoning_text: String::new(),
            turn_segments: Vec::new(),
            last_error: None,
            messages_loaded: false,
            created_at: Utc::now(),
            usage: UsageCounters::default(),
            plan_mode: false,
            plan_complete_prompt: false,
            pending_user_input: None,
            artifacts: Vec::new(),
            active_artifact_id: None,
            artifacts_panel_open: false,
            tasks: Vec::new(),
        }
    }

    /// A draft has no bound conversation yet and is excluded from persistence
    pub fn is_draft(&self) -> bool {
        self.conversation_id.is_none()
    }

    // ========== Transcript ==========

    /// Replace the full message list and mark history as loaded
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.messages_loaded = true;
    }

    /// Append a message, silently ignoring a duplicate id
    ///
    /// The transport delivers at-least-once, so a replayed append must not
    /// insert a second copy; the first inserted content wins.
    pub fn add_message(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            tracing::debug!(message_id = %message.id, "ignoring duplicate message append");
            return;
        }
        self.messages.push(message);
    }

    // ========== Turn accumulation ==========

    /// Append a streaming text delta (append-only, never replaces)
    pub fn append_streaming_text(&mut self, delta: &str) {
        self.streaming_text.push_str(delta);
    }

    /// Append a reasoning delta (append-only, mirrors streaming text)
    pub fn append_reasoning_text(&mut self, delta: &str) {
        self.reasoning_text.push_str(delta);
    }

    /// Toggle the in-progress flag; buffers are untouched
    ///
    /// Starting a turn clears the previous turn's error surface.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.is_streaming = streaming;
        if streaming {
            self.last_error = None;
        }
    }

    /// Reset all turn buffers after the turn has been folded into a message
    ///
    /// Usage counters are deliberately out of reach here; they persist
    /// across turn boundaries.
    pub fn clear_turn(&mut self) {
        self.streaming_text.clear();
        self.reasoning_text.clear();
        self.tool_records.clear();
        self.turn_segments.clear();
    }

    /// Insert a tool record, or merge into the existing one with the same id
    pub fn add_tool_record(&mut self, record: ToolRecord) {
        if let Some(existing) = self
            .tool_records
            .iter_mut()
            .find(|r| r.tool_call_id == record.tool_call_id)
        {
            existing.apply(&ToolRecordPatch {
                status: Some(record.status),
                arguments: record.arguments,
                result: record.result,
                error: record.error,
            });
        } else {
            self.tool_records.push(record);
        }
    }

    /// Merge a partial update into the record with the given id; no-op if absent
    pub fn update_tool_record(&mut self, tool_call_id: &str, patch: &ToolRecordPatch) {
        if let Some(record) = self
            .tool_records
            .iter_mut()
            .find(|r| r.tool_call_id == tool_call_id)
        {
            record.apply(patch);
        }
    }

    /// Append a segment in raw arrival order
    ///
    /// Replay order is derived at read time (see `core::types::replay_order`),
    /// so appends never need to be undone.
    pub fn add_turn_segment(&mut self, segment: TurnSegment) {
        self.turn_segments.push(segment);
    }

    /// Merge a partial update into the first tool segment with the given id
    pub fn update_tool_segment(&mut self, tool_call_id: &str, patch: &ToolRecordPatch) {
        for segment in &mut self.turn_segments {
            if let TurnSegment::Tool(record) = segment {
                if record.tool_call_id == tool_call_id {
                    record.apply(patch);
                    return;
                }
            }
        }
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    // ========== Artifacts ==========

    /// Merge extracted artifacts into the session list
    ///
    /// Deduplicated by content-stable id, and secondarily by `(kind, title)`
    /// to suppress near-duplicates surfaced by different extraction paths
    /// for the same message.
    pub fn add_artifacts(&mut self, artifacts: Vec<Artifact>) {
        for artifact in artifacts {
            let duplicate = self.artifacts.iter().any(|existing| {
                existing.id == artifact.id
                    || (existing.kind == artifact.kind && existing.title == artifact.title)
            });
            if !duplicate {
                self.artifacts.push(artifact);
            }
        }
    }

    // ========== Tasks ==========

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Replace the task with the same id, or append
    pub fn upsert_task(&mut self, task: Task) {
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }

    // ========== Lifecycle ==========

    /// Reset everything except identity, as if the tab were freshly opened
    ///
    /// Used when the session is rebound to a different conversation; this is
    /// the only path that resets usage counters.
    pub fn reset_transient(&mut self) {
        self.mode = SessionMode::default();
        self.messages.clear();
        self.streaming_text.clear();
        self.is_streaming = false;
        self.tool_records.clear();
        self.reasoning_text.clear();
        self.turn_segments.clear();
        self.last_error = None;
        self.messages_loaded = false;
        self.usage = UsageCounters::default();
        self.plan_mode = false;
        self.plan_complete_prompt = false;
        self.pending_user_input = None;
        self.artifacts.clear();
        self.active_artifact_id = None;
        self.artifacts_panel_open = false;
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactKind;
    use crate::core::types::ToolStatus;

    fn session() -> Session {
        Session::new("s1", Some("conv-1".to_string()), "Test")
    }

    #[test]
    fn test_streaming_text_is_append_only() {
        let mut s = session();
        s.append_streaming_text("Hello ");
        s.append_streaming_text("World");
        assert_eq!(s.streaming_text, "Hello World");
    }

    #[test]
    fn test_duplicate_message_id_keeps_first() {
        let mut s = session();
        let mut first = Message::user("s1", "original");
        first.id = "m1".to_string();
        let mut second = Message::user("s1", "replacement");
        second.id = "m1".to_string();

        s.add_message(first);
        s.add_message(second);

        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].content, "original");
    }

    #[test]
    fn test_tool_record_insert_then_merge() {
        let mut s = session();
        s.add_tool_record(ToolRecord::running("tc1", "bash", None));
        s.update_tool_record("tc1", &ToolRecordPatch::completed("output"));

        assert_eq!(s.tool_records.len(), 1);
        let record = &s.tool_records[0];
        assert_eq!(record.status, ToolStatus::Success);
        assert_eq!(record.result.as_deref(), Some("output"));
        assert_eq!(record.tool_name, "bash");
    }

    #[test]
    fn test_update_unknown_tool_record_is_noop() {
        let mut s = session();
        s.update_tool_record("missing", &ToolRecordPatch::completed("x"));
        assert!(s.tool_records.is_empty());
    }

    #[test]
    fn test_add_tool_record_merges_same_id() {
        let mut s = session();
        s.add_tool_record(ToolRecord::running("tc1", "bash", None));
        // A re-delivered start event must not create a second record
        s.add_tool_record(ToolRecord::running("tc1", "bash", None));
        assert_eq!(s.tool_records.len(), 1);
    }

    #[test]
    fn test_update_tool_segment_first_match() {
        let mut s = session();
        s.add_turn_segment(TurnSegment::Tool(ToolRecord::running("tc1", "bash", None)));
        s.add_turn_segment(TurnSegment::text("middle"));
        s.add_turn_segment(TurnSegment::Tool(ToolRecord::running("tc1", "bash", None)));

        s.update_tool_segment("tc1", &ToolRecordPatch::completed("ok"));

        match &s.turn_segments[0] {
            TurnSegment::Tool(record) => assert_eq!(record.status, ToolStatus::Success),
            other => panic!("unexpected segment: {other:?}"),
        }
        match &s.turn_segments[2] {
            TurnSegment::Tool(record) => assert_eq!(record.status, ToolStatus::Running),
            other => panic!("unexpected segment: {other:?}"),
        }
    }

    #[test]
    fn test_clear_turn_leaves_usage_untouched() {
        let mut s = session();
        s.usage.add(100, 50, 0, 0, None);
        s.append_streaming_text("partial");
        s.append_reasoning_text("thinking");
        s.add_tool_record(ToolRecord::running("tc1", "bash", None));
        s.add_turn_segment(TurnSegment::text("partial"));

        s.clear_turn();

        assert_eq!(s.streaming_text, "");
        assert_eq!(s.reasoning_text, "");
        assert!(s.tool_records.is_empty());
        assert!(s.turn_segments.is_empty());
        assert_eq!(s.usage.input_tokens, 100);
        assert_eq!(s.usage.output_tokens, 50);
    }

    #[test]
    fn test_set_streaming_clears_last_error_on_start() {
        let mut s = session();
        s.set_error(Some("stream aborted".to_string()));
        s.set_streaming(true);
        assert!(s.last_error.is_none());
        assert!(s.is_streaming);
    }

    #[test]
    fn test_artifact_dedup_by_id_and_title() {
        let mut s = session();
        let a = Artifact::new(ArtifactKind::Code, "Example", "fn main() {}", None);
        let same_id = a.clone();
        let same_title =
            Artifact::new(ArtifactKind::Code, "Example", "different body", None);
        let fresh = Artifact::new(ArtifactKind::Html, "Page", "<html></html>", None);

        s.add_artifacts(vec![a]);
        s.add_artifacts(vec![same_id, same_title, fresh]);

        assert_eq!(s.artifacts.len(), 2);
    }

    #[test]
    fn test_upsert_task() {
        let mut s = session();
        s.upsert_task(Task::queued("t1", "first"));
        let mut updated = Task::queued("t1", "first");
        updated.status = crate::core::types::TaskStatus::Completed;
        s.upsert_task(updated);
        s.upsert_task(Task::queued("t2", "second"));

        assert_eq!(s.tasks.len(), 2);
        assert_eq!(s.tasks[0].status, crate::core::types::TaskStatus::Completed);
    }

    #[test]
    fn test_reset_transient_keeps_identity_and_resets_usage() {
        let mut s = session();
        let created = s.created_at;
        s.usage.add(10, 5, 0, 0, None);
        s.add_message(Message::user("s1", "hi"));
        s.plan_mode = true;

        s.reset_transient();

        assert_eq!(s.id, "s1");
        assert_eq!(s.created_at, created);
        assert!(s.messages.is_empty());
        assert!(!s.plan_mode);
        assert_eq!(s.usage, UsageCounters::default());
    }
}
