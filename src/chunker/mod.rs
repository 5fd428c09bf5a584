// src/chunker/mod.rs
// Document chunker (§4.7 `ingest_attachment`): splits extracted document
// text into embeddable chunks. Pure function, no I/O — the worker fetches
// and extracts bytes; this only splits already-extracted text.
//
// The teacher has no chunking logic of its own (its document storage layer
// stores whole files); this module is grounded in the markdown-heading-aware
// chunking shape common in the retrieval pack's document-processing
// examples, using `pulldown-cmark` for heading detection.

use crate::rs::AttachmentSourceType;
use crate::sessionizer::approx_tokens;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub index: i32,
    pub text: String,
    pub heading_context: Option<String>,
}

/// Split `text` into chunks of at most `max_tokens` (approx) each, never
/// smaller than `min_tokens` unless the whole document is shorter than
/// that. Markdown gets heading-aware splitting; everything else falls
/// back to paragraph-boundary splitting.
pub fn chunk_document(
    text: &str,
    source_type: AttachmentSourceType,
    max_tokens: usize,
    min_tokens: usize,
) -> Vec<ChunkCandidate> {
    match source_type {
        AttachmentSourceType::Markdown => chunk_markdown(text, max_tokens, min_tokens),
        _ => chunk_plain_text(text, max_tokens, min_tokens),
    }
}

fn chunk_plain_text(text: &str, max_tokens: usize, min_tokens: usize) -> Vec<ChunkCandidate> {
    let paragraphs: Vec<&str> = text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();
    merge_into_chunks(paragraphs.into_iter().map(|p| (None, p.to_string())).collect(), max_tokens, min_tokens)
}

fn chunk_markdown(text: &str, max_tokens: usize, min_tokens: usize) -> Vec<ChunkCandidate> {
    let parser = Parser::new(text);
    let mut sections: Vec<(Option<String>, String)> = Vec::new();
    let mut current_heading: Option<String> = None;
    let mut in_heading = false;
    let mut heading_buf = String::new();
    let mut body_buf = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                if !body_buf.trim().is_empty() {
                    sections.push((current_heading.clone(), std::mem::take(&mut body_buf)));
                }
                in_heading = matches!(level, HeadingLevel::H1 | HeadingLevel::H2 | HeadingLevel::H3);
                heading_buf.clear();
            }
            Event::End(TagEnd::Heading(_)) => {
                if in_heading {
                    current_heading = Some(heading_buf.trim().to_string());
                }
                in_heading = false;
            }
            Event::Text(t) | Event::Code(t) => {
                if in_heading {
                    heading_buf.push_str(&t);
                } else {
                    body_buf.push_str(&t);
                    body_buf.push(' ');
                }
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Item) => {
                body_buf.push('\n');
            }
            _ => {}
        }
    }
    if !body_buf.trim().is_empty() {
        sections.push((current_heading, body_buf));
    }

    let paragraphs: Vec<(Option<String>, String)> = sections
        .into_iter()
        .flat_map(|(heading, body)| {
            body.split('\n')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| (heading.clone(), p.to_string()))
                .collect::<Vec<_>>()
        })
        .collect();

    merge_into_chunks(paragraphs, max_tokens, min_tokens)
}

fn merge_into_chunks(
    paragraphs: Vec<(Option<String>, String)>,
    max_tokens: usize,
    min_tokens: usize,
) -> Vec<ChunkCandidate> {
    let mut chunks = Vec::new();
    let mut current_text = String::new();
    let mut current_heading: Option<String> = None;
    let mut index = 0i32;

    for (heading, paragraph) in paragraphs {
        let would_exceed = approx_tokens(&current_text) + approx_tokens(&paragraph) > max_tokens;
        let heading_changed = heading.is_some() && heading != current_heading;

        if !current_text.is_empty() && (would_exceed || (heading_changed && approx_tokens(&current_text) >= min_tokens)) {
            chunks.push(ChunkCandidate {
                index,
                text: current_text.trim().to_string(),
                heading_context: current_heading.clone(),
            });
            index += 1;
            current_text.clear();
        }

        if heading.is_some() {
            current_heading = heading;
        }
        current_text.push_str(&paragraph);
        current_text.push_str("\n\n");
    }

    if !current_text.trim().is_empty() {
        chunks.push(ChunkCandidate {
            index,
            text: current_text.trim().to_string(),
            heading_context: current_heading,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_splits_on_paragraph_boundaries_under_token_limit() {
        let text = "para one is short.\n\npara two is also short.\n\npara three too.";
        let chunks = chunk_document(text, AttachmentSourceType::Text, 8, 1);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn markdown_chunk_carries_heading_context() {
        let text = "# Intro\n\nThis is the introduction text.\n\n## Details\n\nMore detail here.";
        let chunks = chunk_document(text, AttachmentSourceType::Markdown, 1000, 1);
        assert!(chunks.iter().any(|c| c.heading_context.as_deref() == Some("Intro")));
    }

    #[test]
    fn short_document_produces_single_chunk() {
        let text = "just one short sentence.";
        let chunks = chunk_document(text, AttachmentSourceType::Text, 1000, 1);
        assert_eq!(chunks.len(), 1);
    }
}
