//! Prompt construction and the grounding-text format.
//!
//! Each context chunk is rendered as a block headed by
//! `[Document {position}: {source_name}]` (1-based position), followed by the
//! chunk text. Blocks are separated by a blank line. The same rendering is
//! used inside the prompt and in the stored grounding text, and
//! [`parse_grounding`] reverses it.
//!
//! A chunk line that looks like a block header (optionally already preceded
//! by backslashes) gets one extra leading `\` when rendered, and loses it
//! when parsed, so chunk text can never open a block of its own.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::document::RankedChunk;

/// Opening instruction of every prompt.
pub const PROMPT_HEADER: &str = "Answer the question using the reference documents below.";

static BLOCK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[Document (\d+): (.*)\]$").expect("block header pattern is valid")
});

static ESCAPED_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\*\[Document \d+: .*\]$").expect("escaped header pattern is valid")
});

fn escape_line(line: &str) -> Cow<'_, str> {
    if ESCAPED_HEADER.is_match(line) {
        Cow::Owned(format!("\\{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

fn unescape_line(line: &str) -> &str {
    match line.strip_prefix('\\') {
        Some(rest) if ESCAPED_HEADER.is_match(line) => rest,
        _ => line,
    }
}

fn escape_text(text: &str) -> String {
    text.split('\n').map(escape_line).collect::<Vec<_>>().join("\n")
}

/// Render contexts as grounding text, in the given order.
pub fn format_grounding(contexts: &[RankedChunk]) -> String {
    contexts
        .iter()
        .enumerate()
        .map(|(i, ranked)| {
            let text = escape_text(&ranked.chunk.text);
            format!("[Document {}: {}]\n{text}", i + 1, ranked.chunk.source_name)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the prompt sent to the model.
///
/// Contexts appear in exactly the order given; nothing is re-sorted.
pub fn build_prompt(query: &str, contexts: &[RankedChunk], instruction: &str) -> String {
    format!(
        "{PROMPT_HEADER}\n\n\
         [Reference documents]\n{}\n\n\
         [Question]\n{query}\n\n\
         [Answer]\n{instruction}\n",
        format_grounding(contexts)
    )
}

/// One block recovered from grounding text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingBlock {
    /// 1-based position of the block.
    pub position: usize,
    pub source_name: String,
    pub text: String,
}

/// Split grounding text produced by [`format_grounding`] back into blocks.
///
/// A line only starts a new block if it is an unescaped block header carrying
/// the next expected position. Escaped header lines are restored inside their
/// block. Text before the first header is ignored.
pub fn parse_grounding(grounding: &str) -> Vec<GroundingBlock> {
    let mut blocks: Vec<(usize, String, Vec<&str>)> = Vec::new();

    for line in grounding.split('\n') {
        let expected = blocks.len() + 1;
        let header = BLOCK_HEADER
            .captures(line)
            .filter(|caps| caps[1].parse::<usize>().ok() == Some(expected));

        match header {
            Some(caps) => {
                // Drop the blank separator line closing the previous block.
                if let Some((_, _, lines)) = blocks.last_mut() {
                    if lines.last() == Some(&"") {
                        lines.pop();
                    }
                }
                blocks.push((expected, caps[2].to_string(), Vec::new()));
            }
            None => {
                if let Some((_, _, lines)) = blocks.last_mut() {
                    lines.push(unescape_line(line));
                }
            }
        }
    }

    blocks
        .into_iter()
        .map(|(position, source_name, lines)| GroundingBlock {
            position,
            source_name,
            text: lines.join("\n"),
        })
        .collect()
}
