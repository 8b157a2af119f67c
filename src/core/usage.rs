//! Per-session usage aggregation
//!
//! Tracks token counts, context-window occupancy, and premium-request quota
//! for one session. Token counters only ever grow within a session's
//! lifetime; they are reset by whole-session replacement, never by a
//! turn-boundary clear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative usage counters for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    /// Context-window occupancy snapshot (not a counter)
    pub context_window_used: u64,
    pub context_window_max: u64,
    /// Server-reported premium requests used
    pub premium_requests_used: u64,
    /// Locally incremented premium requests (optimistic, ahead of the server)
    pub premium_requests_local: u64,
    pub premium_requests_total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_reset_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub premium_unlimited: bool,
    /// Last model label reported by the transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl UsageCounters {
    /// Add token deltas to the running totals
    ///
    /// Deltas are non-negative by transport contract; `model`, if given,
    /// overwrites the last-known label.
    pub fn add(
        &mut self,
        input: u64,
        output: u64,
        cache_read: u64,
        cache_write: u64,
        model: Option<&str>,
    ) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.cache_read_tokens += cache_read;
        self.cache_write_tokens += cache_write;
        if let Some(model) = model {
            self.model = Some(model.to_string());
        }
    }

    /// Overwrite the context-window snapshot
    pub fn set_context_window(&mut self, used: u64, max: u64) {
        self.context_window_used = used;
        self.context_window_max = max;
    }

    /// Overwrite the server-reported premium-quota fields
    pub fn set_quota(
        &mut self,
        used: u64,
        total: u64,
        reset_date: Option<DateTime<Utc>>,
        unlimited: bool,
    ) {
        self.premium_requests_used = used;
        self.premium_requests_total = total;
        self.premium_reset_date = reset_date;
        self.premium_unlimited = unlimited;
    }

    /// Optimistically count one premium request before the server confirms it
    pub fn increment_local(&mut self) {
        self.premium_requests_local += 1;
    }

    /// Effective premium-used value for display
    ///
    /// The server value refreshes on a polling cadence and can lag the
    /// optimistic local increment, so the larger of the two is current.
    pub fn premium_requests_effective(&self) -> u64 {
        self.premium_requests_used.max(self.premium_requests_local)
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
