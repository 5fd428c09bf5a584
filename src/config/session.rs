// src/config/session.rs
// Sessionizer tuning parameters (§4.5)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// T_gap: temporal gap (seconds) that starts a new session, absent a reply chain.
    pub time_gap_secs: i64,
    /// T_max: approximate token budget per session before it is forced to split.
    pub max_tokens: usize,
    /// N_large: session size (messages) above which semantic refinement considers splitting.
    pub semantic_refine_threshold_messages: usize,
    /// p: bottom percentile of consecutive-similarity scores treated as a breakpoint.
    pub semantic_percentile: f32,
    /// N_min: minimum messages a semantic split may produce on either side.
    pub semantic_min_messages: usize,
    /// Whether the optional semantic refinement pass runs at all.
    pub semantic_refine_enabled: bool,
    /// W: message window loaded around an anchor message for `sessionize`.
    pub window_size: usize,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            time_gap_secs: super::helpers::env_or_parsed("SESSION_TIME_GAP_SECS", 15 * 60),
            max_tokens: super::helpers::env_or_parsed("SESSION_MAX_TOKENS", 480),
            semantic_refine_threshold_messages: super::helpers::env_or_parsed(
                "SESSION_SEMANTIC_REFINE_THRESHOLD_MESSAGES",
                20,
            ),
            semantic_percentile: super::helpers::env_or_parsed("SESSION_SEMANTIC_PERCENTILE", 5.0),
            semantic_min_messages: super::helpers::env_or_parsed("SESSION_SEMANTIC_MIN_MESSAGES", 2),
            semantic_refine_enabled: super::helpers::env_or_parsed(
                "SESSION_SEMANTIC_REFINE_ENABLED",
                true,
            ),
            window_size: super::helpers::env_or_parsed("SESSION_WINDOW_SIZE", 200),
        }
    }
}
