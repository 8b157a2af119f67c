//! Registry change notifications
//!
//! Events emitted by the registry to subscribed rendering layers. Delivery
//! is best-effort over std mpsc channels; disconnected subscribers are
//! pruned on the next send.

/// Events emitted after registry state changes
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A session was opened (or a draft restored)
    SessionOpened { session_id: String },

    /// A session was closed and removed from the registry
    SessionClosed { session_id: String },

    /// A session's content or settings changed (messages, buffers, usage, ...)
    SessionUpdated { session_id: String },

    /// The active tab changed; `None` when the last tab closed
    ActiveChanged(Option<String>),

    /// The tab ordering was replaced
    OrderChanged,

    /// The soft tab-limit warning flipped
    TabLimitWarning(bool),
}
