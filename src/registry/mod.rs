//! Session registry: the owner of all open tabs
//!
//! Handles:
//! - Tab lifecycle (draft -> materialized -> closed) and ordering
//! - Active-tab selection and neighbor reassignment on close
//! - Delegation of turn/usage bookkeeping to the addressed session
//! - Soft tab-limit warning
//! - Best-effort mirroring of open tabs into the key-value store
//!
//! The registry is an owned instance with explicit construction, not a
//! module-level singleton; rendering layers subscribe to change events and
//! only ever read state. All operations are synchronous state transitions
//! and run to completion before the next transport event is processed.

pub mod events;
pub mod session;

pub use events::RegistryEvent;
pub use session::Session;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};

use crate::artifacts::Artifact;
use crate::core::types::{
    Message, SessionMode, Task, ToolRecord, ToolRecordPatch, TurnSegment, UserInputRequest,
};
use crate::persist::{self, KeyValueStore, PersistedTab};

/// Open-session count at which the soft-limit warning turns on
pub const TAB_SOFT_LIMIT: usize = 15;

/// Registry of all open conversation tabs
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    /// Tab display order (session ids)
    order: Vec<String>,
    active: Option<String>,
    tab_limit_warning: bool,
    store: Option<Box<dyn KeyValueStore>>,
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl SessionRegistry {
    /// Create a registry with no persistence backing
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            active: None,
            tab_limit_warning: false,
            store: None,
            subscribers: Vec::new(),
        }
    }

    /// Create a registry that mirrors open tabs into the given store
    pub fn with_store(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ========== Lifecycle ==========

    /// Open a tab, or re-activate the one already bound to `conversation_id`
    ///
    /// Returns the session id. A `None` conversation id opens a draft, which
    /// is excluded from persistence until materialized.
    pub fn open_session(&mut self, conversation_id: Option<&str>, title: &str) -> String {
        if let Some(conversation_id) = conversation_id {
            if let Some(existing) = self.session_id_for_conversation(conversation_id) {
                self.set_active_session(&existing);
                return existing;
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(&id, conversation_id.map(str::to_string), title);
        let draft = session.is_draft();
        self.sessions.insert(id.clone(), session);
        self.order.push(id.clone());
        self.active = Some(id.clone());

        self.recompute_tab_limit();
        if !draft {
            self.persist();
        }
        self.emit(RegistryEvent::SessionOpened {
            session_id: id.clone(),
        });
        self.emit(RegistryEvent::ActiveChanged(Some(id.clone())));
        id
    }

    /// Bind a draft to a real conversation and mark its history as loaded
    ///
    /// Used when the first message of a new conversation is sent. No-op for
    /// an unknown session id.
    pub fn materialize_session(&mut self, session_id: &str, conversation_id: &str) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        session.conversation_id = Some(conversation_id.to_string());
        session.messages_loaded = true;
        self.persist();
        self.emit(RegistryEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
    }

    /// Close a tab; the neighbor at the same ordering index becomes active
    pub fn close_session(&mut self, session_id: &str) {
        let Some(position) = self.order.iter().position(|id| id == session_id) else {
            return;
        };
        self.order.remove(position);
        self.sessions.remove(session_id);

        if self.active.as_deref() == Some(session_id) {
            let neighbor = if self.order.is_empty() {
                None
            } else {
                let index = position.min(self.order.len() - 1);
                Some(self.order[index].clone())
            };
            self.active = neighbor.clone();
            self.emit(RegistryEvent::ActiveChanged(neighbor));
        }

        self.recompute_tab_limit();
        self.persist();
        self.emit(RegistryEvent::SessionClosed {
            session_id: session_id.to_string(),
        });
    }

    /// Rebind a tab to a different conversation, keeping its identity stable
    ///
    /// All transient streaming/usage/artifact/task state resets to defaults,
    /// as if the tab were freshly opened.
    pub fn switch_conversation(&mut self, session_id: &str, conversation_id: &str, title: &str) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        session.reset_transient();
        session.conversation_id = Some(conversation_id.to_string());
        session.title = title.to_string();
        self.persist();
        self.emit(RegistryEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
    }

    /// Rename a tab
    pub fn rename_session(&mut self, session_id: &str, title: &str) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        session.title = title.to_string();
        self.persist();
        self.emit(RegistryEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
    }

    /// Make a tab active; no-op for unknown ids
    pub fn set_active_session(&mut self, session_id: &str) {
        if !self.sessions.contains_key(session_id) {
            return;
        }
        if self.active.as_deref() == Some(session_id) {
            return;
        }
        self.active = Some(session_id.to_string());
        self.emit(RegistryEvent::ActiveChanged(Some(session_id.to_string())));
    }

    /// Replace the tab ordering; unknown ids are dropped, omitted known ids
    /// keep their relative position at the end
    pub fn reorder(&mut self, session_ids: &[String]) {
        let mut next: Vec<String> = session_ids
            .iter()
            .filter(|id| self.sessions.contains_key(*id))
            .cloned()
            .collect();
        for id in &self.order {
            if !next.contains(id) {
                next.push(id.clone());
            }
        }
        self.order = next;
        self.persist();
        self.emit(RegistryEvent::OrderChanged);
    }

    /// Find the session bound to a conversation id
    pub fn session_id_for_conversation(&self, conversation_id: &str) -> Option<String> {
        self.order
            .iter()
            .find(|id| {
                self.sessions
                    .get(*id)
                    .is_some_and(|s| s.conversation_id.as_deref() == Some(conversation_id))
            })
            .cloned()
    }

    /// Restore persisted tabs from the key-value store
    ///
    /// Runs the one-time legacy key migration, then reconstructs sessions
    /// with empty transient state. Records in the legacy shape (no
    /// `conversationId`) get a fresh session id, with the stored id kept as
    /// the conversation binding. Absent or malformed state restores nothing.
    pub fn restore(&mut self) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        persist::migrate_legacy_keys(store);

        let records = persist::load_open_tabs(store);
        for record in records {
            let (session_id, conversation_id) = match record.conversation_id {
                Some(conversation_id) => (record.id, conversation_id),
                None => {
                    tracing::debug!(conversation_id = %record.id, "migrating legacy tab record");
                    (uuid::Uuid::new_v4().to_string(), record.id)
                }
            };
            if self.sessions.contains_key(&session_id) {
                continue;
            }
            let session = Session::new(&session_id, Some(conversation_id), &record.title);
            self.sessions.insert(session_id.clone(), session);
            self.order.push(session_id.clone());
            self.emit(RegistryEvent::SessionOpened { session_id });
        }

        if self.active.is_none() {
            let first = self.order.first().cloned();
            if first.is_some() {
                self.active = first.clone();
                self.emit(RegistryEvent::ActiveChanged(first));
            }
        }
        self.recompute_tab_limit();
    }

    // ========== Read accessors ==========

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_deref().and_then(|id| self.sessions.get(id))
    }

    /// Tab display order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn tab_limit_warning(&self) -> bool {
        self.tab_limit_warning
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // ========== Per-session delegation ==========
    // Every operation below is a silent no-op for an unknown session id;
    // late-arriving transport events for a closed tab are expected.

    pub fn set_messages(&mut self, session_id: &str, messages: Vec<Message>) {
        self.with_session(session_id, |s| s.set_messages(messages));
    }

    pub fn add_message(&mut self, session_id: &str, message: Message) {
        self.with_session(session_id, |s| s.add_message(message));
    }

    pub fn append_streaming_text(&mut self, session_id: &str, delta: &str) {
        self.with_session(session_id, |s| s.append_streaming_text(delta));
    }

    pub fn set_streaming(&mut self, session_id: &str, streaming: bool) {
        self.with_session(session_id, |s| s.set_streaming(streaming));
    }

    pub fn clear_turn(&mut self, session_id: &str) {
        self.with_session(session_id, |s| s.clear_turn());
    }

    pub fn add_tool_record(&mut self, session_id: &str, record: ToolRecord) {
        self.with_session(session_id, |s| s.add_tool_record(record));
    }

    pub fn update_tool_record(
        &mut self,
        session_id: &str,
        tool_call_id: &str,
        patch: &ToolRecordPatch,
    ) {
        self.with_session(session_id, |s| s.update_tool_record(tool_call_id, patch));
    }

    pub fn append_reasoning_text(&mut self, session_id: &str, delta: &str) {
        self.with_session(session_id, |s| s.append_reasoning_text(delta));
    }

    pub fn add_turn_segment(&mut self, session_id: &str, segment: TurnSegment) {
        self.with_session(session_id, |s| s.add_turn_segment(segment));
    }

    pub fn update_tool_segment(
        &mut self,
        session_id: &str,
        tool_call_id: &str,
        patch: &ToolRecordPatch,
    ) {
        self.with_session(session_id, |s| s.update_tool_segment(tool_call_id, patch));
    }

    pub fn set_error(&mut self, session_id: &str, error: Option<String>) {
        self.with_session(session_id, |s| s.set_error(error));
    }

    pub fn set_mode(&mut self, session_id: &str, mode: SessionMode) {
        self.with_session(session_id, |s| s.mode = mode);
    }

    pub fn add_usage(
        &mut self,
        session_id: &str,
        input: u64,
        output: u64,
        cache_read: u64,
        cache_write: u64,
        model: Option<&str>,
    ) {
        self.with_session(session_id, |s| {
            s.usage.add(input, output, cache_read, cache_write, model)
        });
    }

    pub fn set_context_window(&mut self, session_id: &str, used: u64, max: u64) {
        self.with_session(session_id, |s| s.usage.set_context_window(used, max));
    }

    pub fn set_quota(
        &mut self,
        session_id: &str,
        used: u64,
        total: u64,
        reset_date: Option<DateTime<Utc>>,
        unlimited: bool,
    ) {
        self.with_session(session_id, |s| {
            s.usage.set_quota(used, total, reset_date, unlimited)
        });
    }

    pub fn increment_local_quota(&mut self, session_id: &str) {
        self.with_session(session_id, |s| s.usage.increment_local());
    }

    pub fn set_plan_mode(&mut self, session_id: &str, plan_mode: bool) {
        self.with_session(session_id, |s| s.plan_mode = plan_mode);
    }

    pub fn set_plan_complete_prompt(&mut self, session_id: &str, visible: bool) {
        self.with_session(session_id, |s| s.plan_complete_prompt = visible);
    }

    pub fn set_pending_user_input(&mut self, session_id: &str, request: Option<UserInputRequest>) {
        self.with_session(session_id, |s| s.pending_user_input = request);
    }

    pub fn add_artifacts(&mut self, session_id: &str, artifacts: Vec<Artifact>) {
        self.with_session(session_id, |s| s.add_artifacts(artifacts));
    }

    pub fn set_active_artifact(&mut self, session_id: &str, artifact_id: Option<String>) {
        self.with_session(session_id, |s| s.active_artifact_id = artifact_id);
    }

    pub fn set_artifacts_panel_open(&mut self, session_id: &str, open: bool) {
        self.with_session(session_id, |s| s.artifacts_panel_open = open);
    }

    pub fn set_tasks(&mut self, session_id: &str, tasks: Vec<Task>) {
        self.with_session(session_id, |s| s.set_tasks(tasks));
    }

    pub fn upsert_task(&mut self, session_id: &str, task: Task) {
        self.with_session(session_id, |s| s.upsert_task(task));
    }

    // ========== Internals ==========

    fn with_session<R>(&mut self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let result = self.sessions.get_mut(session_id).map(f);
        if result.is_some() {
            self.emit(RegistryEvent::SessionUpdated {
                session_id: session_id.to_string(),
            });
        }
        result
    }

    fn recompute_tab_limit(&mut self) {
        let warning = self.sessions.len() >= TAB_SOFT_LIMIT;
        if warning != self.tab_limit_warning {
            self.tab_limit_warning = warning;
            self.emit(RegistryEvent::TabLimitWarning(warning));
        }
    }

    /// Mirror the non-draft tab summary into the store (best-effort)
    fn persist(&self) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        let tabs: Vec<PersistedTab> = self
            .order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .filter(|session| !session.is_draft())
            .map(|session| PersistedTab {
                id: session.id.clone(),
                title: session.title.clone(),
                conversation_id: session.conversation_id.clone(),
            })
            .collect();
        persist::save_open_tabs(store, &tabs);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
