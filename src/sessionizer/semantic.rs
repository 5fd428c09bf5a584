// src/sessionizer/semantic.rs
// Optional semantic refinement (§4.5): splits a large temporal session at
// points of low similarity between consecutive messages. Pure function of
// the message list, a percentile threshold, and precomputed embeddings —
// the sessionizer itself never calls the Embedder.

use crate::rs::Message;
use std::collections::HashMap;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Split `group` at breakpoints where consecutive-message similarity falls
/// into the bottom `percentile` of observed similarities, provided the
/// resulting sub-sessions each have at least `min_messages` messages.
/// Messages without a precomputed embedding disable refinement entirely —
/// the group is returned unsplit rather than guessed at.
pub fn refine<'a>(
    group: Vec<&'a Message>,
    percentile: f64,
    min_messages: usize,
    embedding_by_id: &HashMap<i64, &Vec<f32>>,
) -> Vec<Vec<&'a Message>> {
    if group.len() < 2 {
        return vec![group];
    }

    let embeddings: Option<Vec<&Vec<f32>>> = group.iter().map(|m| embedding_by_id.get(&m.id).copied()).collect();
    let Some(embeddings) = embeddings else {
        return vec![group];
    };

    let mut similarities: Vec<f32> = Vec::with_capacity(embeddings.len() - 1);
    for window in embeddings.windows(2) {
        similarities.push(cosine(window[0], window[1]));
    }

    let mut sorted = similarities.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let cutoff_idx = ((percentile / 100.0) * sorted.len() as f64).floor() as usize;
    let threshold = sorted.get(cutoff_idx.min(sorted.len().saturating_sub(1))).copied().unwrap_or(f32::MIN);

    let mut breakpoints: Vec<usize> = similarities
        .iter()
        .enumerate()
        .filter(|(_, &sim)| sim <= threshold)
        .map(|(i, _)| i + 1)
        .collect();
    breakpoints.sort_unstable();
    breakpoints.dedup();

    let mut sub_sessions: Vec<Vec<&Message>> = Vec::new();
    let mut start = 0;
    for &bp in &breakpoints {
        let candidate = &group[start..bp];
        if candidate.len() >= min_messages {
            sub_sessions.push(group[start..bp].to_vec());
            start = bp;
        }
    }
    sub_sessions.push(group[start..].to_vec());

    // Merge any trailing sub-session that fell below min_messages into its
    // predecessor rather than emitting an under-sized session.
    if sub_sessions.len() > 1 {
        let last = sub_sessions.last().unwrap();
        if last.len() < min_messages {
            let tail = sub_sessions.pop().unwrap();
            sub_sessions.last_mut().unwrap().extend(tail);
        }
    }

    sub_sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: i64, embedding: Vec<f32>, map: &mut HashMap<i64, Vec<f32>>) -> Message {
        map.insert(id, embedding);
        Message {
            id,
            channel_id: 1,
            guild_id: 1,
            author_id: 1,
            content: "x".into(),
            reply_to_id: None,
            timestamp: Utc.timestamp_opt(id, 0).unwrap(),
            is_deleted: false,
            deleted_at: None,
            vector_key: None,
            indexed_at: None,
            updated_at: Utc.timestamp_opt(id, 0).unwrap(),
        }
    }

    #[test]
    fn splits_at_low_similarity_breakpoint() {
        let mut embeddings = HashMap::new();
        let messages: Vec<Message> = vec![
            msg(1, vec![1.0, 0.0], &mut embeddings),
            msg(2, vec![1.0, 0.0], &mut embeddings),
            msg(3, vec![1.0, 0.0], &mut embeddings),
            msg(4, vec![0.0, 1.0], &mut embeddings),
            msg(5, vec![0.0, 1.0], &mut embeddings),
            msg(6, vec![0.0, 1.0], &mut embeddings),
        ];
        let lookup: HashMap<i64, &Vec<f32>> = embeddings.iter().map(|(k, v)| (*k, v)).collect();
        let refs: Vec<&Message> = messages.iter().collect();

        let result = refine(refs, 20.0, 2, &lookup);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(result[1].iter().map(|m| m.id).collect::<Vec<_>>(), vec![4, 5, 6]);
    }

    #[test]
    fn missing_embedding_disables_refinement() {
        let mut embeddings = HashMap::new();
        let messages: Vec<Message> = vec![
            msg(1, vec![1.0, 0.0], &mut embeddings),
            msg(2, vec![1.0, 0.0], &mut embeddings),
        ];
        let lookup: HashMap<i64, &Vec<f32>> = HashMap::new();
        let refs: Vec<&Message> = messages.iter().collect();

        let result = refine(refs, 5.0, 2, &lookup);
        assert_eq!(result.len(), 1);
    }
}
