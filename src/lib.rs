//! tabstate - session-state engine for multi-tab AI chat frontends
//!
//! Handles:
//! - Tab registry: open/close/reorder sessions, active-tab tracking
//! - Turn accumulation: streaming text, reasoning, and tool activity
//! - Per-session usage counters (tokens, context window, quota)
//! - Artifact extraction from assistant output and file-write tools
//! - Best-effort persistence of the open-tab set across restarts
//!
//! The crate is transport-agnostic: a frontend feeds it parsed stream
//! events and renders from the resulting state. All state transitions are
//! synchronous; change notifications go out over subscriber channels.

pub mod artifacts;
pub mod core;
pub mod persist;
pub mod registry;

pub use artifacts::{extract_from_text, extract_from_tool_activity, Artifact, ArtifactKind};
pub use core::{
    replay_order, Message, MessageRole, PersistError, SessionMode, Task, TaskStatus, ToolRecord,
    ToolRecordPatch, ToolStatus, TurnSegment, UsageCounters, UserInputRequest,
};
pub use persist::{JsonFileStore, KeyValueStore, MemoryStore, PersistedTab};
pub use registry::{RegistryEvent, Session, SessionRegistry, TAB_SOFT_LIMIT};
