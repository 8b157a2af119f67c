//! Core domain model: segments, messages, usage counters, errors

pub mod errors;
pub mod types;
pub mod usage;

pub use errors::PersistError;
pub use types::{
    replay_order, Message, MessageRole, SessionMode, Task, TaskStatus, ToolRecord,
    ToolRecordPatch, ToolStatus, TurnSegment, UserInputRequest,
};
pub use usage::UsageCounters;
