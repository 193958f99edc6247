use std::collections::HashMap;

use crate::document::Document;

/// A bounded-size text segment derived from a Document, the unit of
/// embedding and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Unique identifier, `"{document_id}#{ordinal}"`.
    pub id: String,
    /// Back-reference to the source document (non-owning).
    pub document_id: String,
    /// The chunk text, at most the configured maximum number of characters.
    pub text: String,
    /// Position of this chunk within its document.
    pub ordinal: usize,
    /// Character offset where this chunk starts.
    pub char_start: usize,
    /// Character offset one past the last character. Always greater than
    /// `char_start`.
    pub char_end: usize,
    /// Flat source metadata persisted alongside the vector.
    pub metadata: HashMap<String, String>,
}

/// Split a document into overlapping chunks carrying its source metadata.
///
/// Consecutive chunks of the same document share exactly `overlap`
/// characters: the tail of chunk `i` is the prefix of chunk `i + 1`.
pub fn chunk_document(doc: &Document, max_size: usize, overlap: usize) -> Vec<Chunk> {
    let texts = split_text(&doc.raw_text, max_size, overlap);

    let mut chunks = Vec::with_capacity(texts.len());
    let mut cursor = 0usize;
    for (ordinal, text) in texts.into_iter().enumerate() {
        let len = text.chars().count();
        let char_start = cursor;
        let char_end = char_start + len;
        // The next chunk re-covers the trailing overlap characters.
        cursor = char_end.saturating_sub(overlap.min(len));

        let mut metadata = HashMap::new();
        metadata.insert(
            "source_type".to_string(),
            doc.source_type.as_str().to_string(),
        );
        metadata.insert("source_id".to_string(), doc.source_id.clone());
        metadata.insert("title".to_string(), doc.title.clone());
        if !doc.tags.is_empty() {
            let tags = doc.tags.iter().cloned().collect::<Vec<_>>().join(",");
            metadata.insert("tags".to_string(), tags);
        }

        chunks.push(Chunk {
            id: format!("{}#{}", doc.id, ordinal),
            document_id: doc.id.clone(),
            text,
            ordinal,
            char_start,
            char_end,
            metadata,
        });
    }

    chunks
}

/// Split text into segments of at most `max_size` characters.
///
/// Splits on paragraph boundaries where possible, falls back to sentences,
/// and hard-cuts any single sentence that still exceeds the budget. Empty
/// input yields no segments; input shorter than `max_size` yields exactly
/// one. The size bound holds for every `overlap < max_size`; when the
/// overlap leaves no room for a unit and its separator, the carried-over
/// tail is shortened so the bound still wins.
pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Leave room for the overlap seed and a separator in every chunk so a
    // single unit can never push a chunk past `max_size`.
    let unit_cap = max_size.saturating_sub(overlap + 2).max(1);
    let units = collect_units(text, unit_cap);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for unit in units {
        let unit_len = unit.text.chars().count();
        let sep_len = if current.is_empty() {
            0
        } else {
            unit.separator.chars().count()
        };

        if !current.is_empty() && current_len + sep_len + unit_len > max_size {
            // Seed the next chunk with the exact tail of the finished one,
            // shortened if the incoming unit would otherwise overflow it.
            let budget = max_size.saturating_sub(sep_len + unit_len).min(overlap);
            let seed = char_suffix(&current, budget);
            chunks.push(std::mem::replace(&mut current, seed));
            current_len = current.chars().count();
        }

        if !current.is_empty() {
            current.push_str(unit.separator);
            current_len += unit.separator.chars().count();
        }
        current.push_str(&unit.text);
        current_len += unit_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// A splittable text unit and the separator placed before it when it
/// follows other text in the same chunk.
struct Unit {
    text: String,
    separator: &'static str,
}

/// Break text into paragraph units, splitting oversized paragraphs into
/// sentences and hard-cutting sentences that still exceed `cap` characters.
fn collect_units(text: &str, cap: usize) -> Vec<Unit> {
    let mut units = Vec::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if paragraph.chars().count() <= cap {
            units.push(Unit {
                text: paragraph.to_string(),
                separator: "\n\n",
            });
            continue;
        }

        let mut first_sentence = true;
        for sentence in split_sentences(paragraph) {
            for (i, piece) in hard_cut(&sentence, cap).into_iter().enumerate() {
                // Continuation pieces of a hard cut were split mid-text;
                // rejoining them must not insert characters.
                let separator = if i > 0 {
                    ""
                } else if first_sentence {
                    "\n\n"
                } else {
                    " "
                };
                units.push(Unit {
                    text: piece,
                    separator,
                });
            }
            first_sentence = false;
        }
    }

    units
}

/// Naive sentence split that keeps the terminating punctuation.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut buffer = String::new();

    for c in text.chars() {
        buffer.push(c);
        if matches!(c, '.' | '!' | '?' | '\n') {
            let sentence = buffer.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            buffer.clear();
        }
    }

    let sentence = buffer.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }

    sentences
}

/// Cut a string into pieces of at most `cap` characters.
fn hard_cut(text: &str, cap: usize) -> Vec<String> {
    if text.chars().count() <= cap {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(cap)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// The last `n` characters of a string (the whole string if shorter).
fn char_suffix(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, SourceType};
    use std::collections::BTreeSet;

    fn assert_invariants(chunks: &[String], max_size: usize, overlap: usize) {
        for chunk in chunks {
            assert!(
                chunk.chars().count() <= max_size,
                "chunk of {} chars exceeds max {}",
                chunk.chars().count(),
                max_size
            );
        }
        for pair in chunks.windows(2) {
            let tail = char_suffix(&pair[0], overlap);
            assert!(
                pair[1].starts_with(&tail),
                "overlap mismatch: tail {:?} is not a prefix of the next chunk",
                tail
            );
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_text("", 200, 20).is_empty());
        assert!(split_text("   \n\n  ", 200, 20).is_empty());
    }

    #[test]
    fn short_input_yields_one_chunk() {
        let chunks = split_text("Short bio.", 200, 20);
        assert_eq!(chunks, vec!["Short bio.".to_string()]);
    }

    #[test]
    fn long_text_produces_overlapping_chunks() {
        let sentence = "Lorem ipsum dolor sit amet, consectetur adipiscing elit sed do.";
        let text = vec![sentence; 9].join(" ");
        assert!(text.chars().count() >= 500);

        let chunks = split_text(&text, 200, 20);
        assert!(chunks.len() >= 3, "expected several chunks, got {}", chunks.len());
        assert_invariants(&chunks, 200, 20);
    }

    #[test]
    fn six_hundred_char_text_splits_into_three_or_four_chunks() {
        // 15 sentences of 39 chars joined by spaces: 599 characters.
        let sentence = "Lorem ipsum dolor sit amet consectetur.";
        let text = vec![sentence; 15].join(" ");
        assert_eq!(text.chars().count(), 599);

        let chunks = split_text(&text, 200, 20);
        assert!(
            (3..=4).contains(&chunks.len()),
            "expected 3..=4 chunks, got {}",
            chunks.len()
        );
        assert_invariants(&chunks, 200, 20);
    }

    #[test]
    fn dense_overlap_respects_the_size_bound() {
        let text = "x".repeat(100);
        let chunks = split_text(&text, 10, 9);
        assert!(chunks.len() > 1);
        assert_invariants(&chunks, 10, 9);
    }

    #[test]
    fn degenerate_config_never_exceeds_the_bound() {
        // Tiny paragraphs force the two-character paragraph separator into
        // chunks that the overlap already nearly fills.
        let text = vec!["ab"; 40].join("\n\n");
        for chunk in split_text(&text, 10, 9) {
            assert!(chunk.chars().count() <= 10, "chunk {:?} exceeds max 10", chunk);
        }
    }

    #[test]
    fn oversized_run_is_hard_cut() {
        let text: String = std::iter::repeat('x').take(900).collect();
        let chunks = split_text(&text, 200, 20);
        assert!(chunks.len() > 1);
        assert_invariants(&chunks, 200, 20);
    }

    #[test]
    fn paragraphs_that_fit_stay_together() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = split_text(text, 200, 20);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("\n\n"));
    }

    #[test]
    fn chunk_document_sets_ordinals_spans_and_metadata() {
        let doc = Document {
            id: "project-demo".to_string(),
            source_type: SourceType::Website,
            source_id: "demo".to_string(),
            title: "Demo".to_string(),
            raw_text: vec!["A sentence of reasonable length for the test."; 20].join(" "),
            tags: BTreeSet::from(["AI".to_string(), "Rust".to_string()]),
        };

        let chunks = chunk_document(&doc, 200, 20);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.id, format!("project-demo#{}", i));
            assert_eq!(chunk.document_id, "project-demo");
            assert!(chunk.char_end > chunk.char_start);
            assert_eq!(chunk.metadata["source_type"], "website");
            assert_eq!(chunk.metadata["source_id"], "demo");
            assert_eq!(chunk.metadata["tags"], "AI,Rust");
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].char_start, pair[0].char_end - 20);
        }
    }
}
