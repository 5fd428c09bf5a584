// src/sessionizer/mod.rs
// Sessionizer (§4.5): groups consecutive messages into conversational
// sessions. Pure, deterministic, no I/O — grounded in the teacher's
// pure-function style for pipeline stages that must be independently
// unit-testable.

pub mod semantic;

use crate::rs::Message;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct SessionParams {
    pub time_gap_secs: i64,
    pub max_tokens: usize,
    pub semantic_refine_threshold_messages: usize,
    pub semantic_refine_enabled: bool,
    pub semantic_percentile: f64,
    pub semantic_min_messages: usize,
}

/// A candidate session produced by `sessionize`, before it is persisted.
#[derive(Debug, Clone)]
pub struct SessionCandidate {
    pub message_ids: Vec<i64>,
    pub start_message_id: i64,
    pub end_message_id: i64,
    pub message_count: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Whitespace/byte-length proxy for token count — a deterministic,
/// monotonic stand-in for a full tokenizer (§4.5 ambient detail).
pub fn approx_tokens(text: &str) -> usize {
    text.len() / 4
}

fn is_reply_into(message: &Message, session_ids: &[i64]) -> bool {
    message
        .reply_to_id
        .map(|id| session_ids.contains(&id))
        .unwrap_or(false)
}

/// Group `messages` (already ordered ascending by id/timestamp, from one
/// channel) into sessions via the temporal-gap + reply-chain heuristic,
/// then optionally refine large sessions with `semantic::refine`.
///
/// Sessions with fewer than two messages are dropped — a lone message is
/// only ever embedded as part of a reply chain or an explicit request
/// (e.g. a document attachment), never as a one-line session.
pub fn sessionize(
    messages: &[Message],
    params: &SessionParams,
    embeddings_for_refinement: Option<&[Vec<f32>]>,
) -> Vec<SessionCandidate> {
    let mut raw_groups: Vec<Vec<&Message>> = Vec::new();
    let mut current: Vec<&Message> = Vec::new();
    let mut current_tokens = 0usize;

    for message in messages {
        if message.is_deleted {
            continue;
        }

        let starts_new = if current.is_empty() {
            false
        } else {
            let prev = current.last().unwrap();
            let gap_secs = (message.timestamp - prev.timestamp).num_seconds();
            let session_ids: Vec<i64> = current.iter().map(|m| m.id).collect();
            let chained = is_reply_into(message, &session_ids);

            let gap_exceeded = gap_secs > params.time_gap_secs && !chained;
            let would_exceed_tokens = current_tokens + approx_tokens(&message.content) > params.max_tokens;

            gap_exceeded || would_exceed_tokens
        };

        if starts_new {
            raw_groups.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        current_tokens += approx_tokens(&message.content);
        current.push(message);
    }
    if !current.is_empty() {
        raw_groups.push(current);
    }

    let embedding_by_id: std::collections::HashMap<i64, &Vec<f32>> = match embeddings_for_refinement {
        Some(embeddings) => messages.iter().map(|m| m.id).zip(embeddings.iter()).collect(),
        None => std::collections::HashMap::new(),
    };

    let refined_groups: Vec<Vec<&Message>> = if params.semantic_refine_enabled && !embedding_by_id.is_empty() {
        raw_groups
            .into_iter()
            .flat_map(|group| {
                if group.len() > params.semantic_refine_threshold_messages {
                    semantic::refine(group, params.semantic_percentile, params.semantic_min_messages, &embedding_by_id)
                } else {
                    vec![group]
                }
            })
            .collect()
    } else {
        raw_groups
    };

    refined_groups
        .into_iter()
        .filter(|group| group.len() >= 2)
        .map(|group| SessionCandidate {
            message_ids: group.iter().map(|m| m.id).collect(),
            start_message_id: group.first().unwrap().id,
            end_message_id: group.last().unwrap().id,
            message_count: group.len() as i64,
            start_time: group.first().unwrap().timestamp,
            end_time: group.last().unwrap().timestamp,
        })
        .collect()
}

/// Build the canonical enrichment text handed to the Embedder (§4.5). The
/// raw message records are never mutated by this.
pub fn build_enrichment_text(channel_name: &str, messages: &[(&str, DateTime<Utc>, &str)]) -> String {
    let mut out = format!("Conversation in #{channel_name}:\n");
    for (author, ts, content) in messages {
        out.push_str(&format!("[{author} @ {}]: {content}\n", ts.format("%Y-%m-%d %H:%M")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn msg(id: i64, ts_secs: i64, content: &str, reply_to: Option<i64>) -> Message {
        Message {
            id,
            channel_id: 1,
            guild_id: 1,
            author_id: 1,
            content: content.to_string(),
            reply_to_id: reply_to,
            timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            is_deleted: false,
            deleted_at: None,
            vector_key: None,
            indexed_at: None,
            updated_at: Utc.timestamp_opt(ts_secs, 0).unwrap(),
        }
    }

    fn default_params() -> SessionParams {
        SessionParams {
            time_gap_secs: 900,
            max_tokens: 480,
            semantic_refine_threshold_messages: 20,
            semantic_refine_enabled: false,
            semantic_percentile: 5.0,
            semantic_min_messages: 2,
        }
    }

    #[test]
    fn groups_messages_within_time_gap() {
        let messages = vec![
            msg(1, 0, "hi", None),
            msg(2, 60, "hello", None),
            msg(3, 120, "how are you", None),
        ];
        let sessions = sessionize(&messages, &default_params(), None);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].message_count, 3);
    }

    #[test]
    fn splits_on_temporal_gap() {
        let messages = vec![
            msg(1, 0, "hi", None),
            msg(2, 60, "hello", None),
            msg(3, 3600, "new topic", None),
            msg(4, 3660, "continuing", None),
        ];
        let sessions = sessionize(&messages, &default_params(), None);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].message_ids, vec![1, 2]);
        assert_eq!(sessions[1].message_ids, vec![3, 4]);
    }

    #[test]
    fn reply_chain_bridges_temporal_gap() {
        let messages = vec![
            msg(1, 0, "hi", None),
            msg(2, 60, "hello", None),
            msg(3, 3600, "replying to earlier", Some(1)),
        ];
        let sessions = sessionize(&messages, &default_params(), None);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].message_ids, vec![1, 2, 3]);
    }

    #[test]
    fn single_message_session_is_dropped() {
        let messages = vec![msg(1, 0, "lone message", None), msg(2, 10_000, "unrelated", None)];
        let sessions = sessionize(&messages, &default_params(), None);
        assert!(sessions.is_empty());
    }

    #[test]
    fn deleted_messages_are_excluded() {
        let mut deleted = msg(2, 60, "deleted content", None);
        deleted.is_deleted = true;
        let messages = vec![msg(1, 0, "hi", None), deleted, msg(3, 120, "hello", None)];
        let sessions = sessionize(&messages, &default_params(), None);
        assert_eq!(sessions[0].message_ids, vec![1, 3]);
    }

    #[test]
    fn enrichment_text_matches_canonical_form() {
        let ts = Utc.timestamp_opt(0, 0).unwrap();
        let text = build_enrichment_text("general", &[("alice", ts, "hi there")]);
        assert!(text.starts_with("Conversation in #general:\n"));
        assert!(text.contains("[alice @ 1970-01-01 00:00]: hi there"));
    }
}
