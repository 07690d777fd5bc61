//! Section/line text chunker with carried-over context.
//!
//! Splits normalized document text into [`Chunk`]s bounded by
//! [`ChunkParams::max_chars`]. Splitting prefers section boundaries
//! (`\n\n`), which the tabular normalizer emits between records, and falls
//! back to single line breaks for sections that are too large on their own.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` into sections; skip whitespace-only sections.
//! 2. Accumulate sections into a buffer. Before a section would push the
//!    buffer past `max_chars`, flush the buffer as a chunk and seed the next
//!    buffer with the trailing section, when it fits the overlap budget.
//! 3. A section longer than `max_chars` is split on `\n` and its lines are
//!    fed into the same buffer (carrying up to three lines). The buffer is
//!    not reset when switching between sections and lines, so overlap
//!    crosses those boundaries too.
//! 4. A single unit longer than `max_chars` becomes its own chunk, flagged
//!    [`Chunk::oversized`]. Nothing is truncated.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::{split, ChunkParams};
//!
//! let chunks = split("Hello world.\n\nSecond paragraph.", ChunkParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].index, 0);
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Default chunk size bound, in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;
/// Default budget for content carried from one chunk into the next.
pub const DEFAULT_OVERLAP_CHARS: usize = 100;

const SECTION_SEPARATOR: &str = "\n\n";
const LINE_SEPARATOR: &str = "\n";
const SECTION_OVERLAP_UNITS: usize = 1;
const LINE_OVERLAP_UNITS: usize = 3;

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Maximum characters per chunk (atomic units longer than this pass through whole).
    pub max_chars: usize,
    /// Maximum characters of trailing content repeated at the start of the next chunk.
    pub overlap_chars: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// Split normalized text into an ordered chunk sequence.
///
/// Deterministic: identical input and parameters always yield an identical
/// sequence. Empty or whitespace-only input yields no chunks.
pub fn split(text: &str, params: ChunkParams) -> Vec<Chunk> {
    let mut pieces: Vec<String> = Vec::new();
    let mut buffer = Accumulator::new(params);

    for raw in text.split(SECTION_SEPARATOR) {
        let section = raw.trim_matches(|c| c == '\n' || c == '\r');
        if section.trim().is_empty() {
            continue;
        }

        if char_len(section) > params.max_chars {
            // The first line still sits a section break away from what is buffered.
            let mut separator = SECTION_SEPARATOR;
            for line in section.split('\n') {
                let line = line.trim_end_matches('\r');
                if line.trim().is_empty() {
                    continue;
                }
                buffer.push(line, separator, LINE_OVERLAP_UNITS, &mut pieces);
                separator = LINE_SEPARATOR;
            }
        } else {
            buffer.push(section, SECTION_SEPARATOR, SECTION_OVERLAP_UNITS, &mut pieces);
        }
    }
    buffer.drain(&mut pieces);

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| make_chunk(index, text, params.max_chars))
        .collect()
}

/// A buffered section or line, with the separator that joins it to the
/// unit before it.
struct Unit<'a> {
    text: &'a str,
    separator: &'static str,
    len: usize,
}

/// Buffered accumulate/flush/overlap primitive shared by the section and
/// line passes.
struct Accumulator<'a> {
    max_chars: usize,
    overlap_chars: usize,
    units: Vec<Unit<'a>>,
    /// Character length of the joined buffer.
    len: usize,
}

impl<'a> Accumulator<'a> {
    fn new(params: ChunkParams) -> Self {
        Self {
            max_chars: params.max_chars,
            overlap_chars: params.overlap_chars,
            units: Vec::new(),
            len: 0,
        }
    }

    /// Append `text`, flushing first when it would overflow the buffer.
    /// `overlap_units` caps how many trailing units that flush may carry.
    fn push(
        &mut self,
        text: &'a str,
        separator: &'static str,
        overlap_units: usize,
        out: &mut Vec<String>,
    ) {
        let len = char_len(text);
        let incoming = char_len(separator) + len;
        if !self.units.is_empty() && self.len + incoming > self.max_chars {
            self.flush_with_overlap(incoming, overlap_units, out);
        }
        if self.units.is_empty() {
            self.len = len;
        } else {
            self.len += incoming;
        }
        self.units.push(Unit {
            text,
            separator,
            len,
        });
    }

    fn joined(&self) -> String {
        let mut text = String::new();
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                text.push_str(unit.separator);
            }
            text.push_str(unit.text);
        }
        text
    }

    /// Emit the buffer, then keep the trailing units that fit both the
    /// overlap budget and the size bound once `incoming` more characters
    /// (separator included) are appended.
    fn flush_with_overlap(&mut self, incoming: usize, overlap_units: usize, out: &mut Vec<String>) {
        out.push(self.joined());

        let mut carry = 0usize;
        let mut carry_len = 0usize;
        for k in (0..self.units.len()).rev().take(overlap_units) {
            let candidate = if carry == 0 {
                self.units[k].len
            } else {
                self.units[k].len + char_len(self.units[k + 1].separator) + carry_len
            };
            if candidate > self.overlap_chars || candidate + incoming > self.max_chars {
                break;
            }
            carry += 1;
            carry_len = candidate;
        }

        let start = self.units.len() - carry;
        self.units.drain(..start);
        self.len = carry_len;
    }

    /// Emit whatever is buffered, without carrying anything forward.
    fn drain(&mut self, out: &mut Vec<String>) {
        if !self.units.is_empty() {
            out.push(self.joined());
        }
        self.units.clear();
        self.len = 0;
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(index: usize, text: String, max_chars: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let oversized = char_len(&text) > max_chars;

    Chunk {
        index,
        text,
        hash,
        oversized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_chars: usize, overlap_chars: usize) -> ChunkParams {
        ChunkParams {
            max_chars,
            overlap_chars,
        }
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_empty_text() {
        assert!(split("", ChunkParams::default()).is_empty());
        assert!(split("\n\n  \n\n", ChunkParams::default()).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = split("Hello, world!", ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert!(!chunks[0].oversized);
    }

    #[test]
    fn test_sections_keep_double_break() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split(text, ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_overlap_carries_last_section() {
        let chunks = split("aaaa\n\nbbbb\n\ncccc", params(10, 4));
        assert_eq!(texts(&chunks), vec!["aaaa\n\nbbbb", "bbbb\n\ncccc"]);
    }

    #[test]
    fn test_zero_overlap_carries_nothing() {
        let chunks = split("aaaa\n\nbbbb\n\ncccc", params(10, 0));
        assert_eq!(texts(&chunks), vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn test_overlap_dropped_when_it_would_overflow() {
        // Carrying "bbbb" next to "cccccc" would make 12 chars > 10.
        let chunks = split("aaaa\n\nbbbb\n\ncccccc", params(10, 8));
        assert_eq!(texts(&chunks), vec!["aaaa\n\nbbbb", "cccccc"]);
    }

    #[test]
    fn test_oversized_section_split_by_lines() {
        let text = "short\n\nline one here\nline two\nx";
        let chunks = split(text, params(10, 4));
        assert_eq!(texts(&chunks), vec!["short", "line one here", "line two\nx"]);
        assert!(chunks[1].oversized);
        assert!(!chunks[2].oversized);
    }

    #[test]
    fn test_line_overlap_carries_up_to_three_lines() {
        let section = "l1\nl2\nl3\nl4\nl5\nl6\nl7";
        // 20 chars total, so the section goes through the line pass.
        let chunks = split(section, params(12, 8));
        assert_eq!(
            texts(&chunks),
            vec![
                "l1\nl2\nl3\nl4",
                "l2\nl3\nl4\nl5",
                "l3\nl4\nl5\nl6",
                "l4\nl5\nl6\nl7",
            ]
        );
        assert!(chunks.iter().all(|c| c.char_len() <= 12));
    }

    #[test]
    fn test_overlap_crosses_line_pass_boundaries() {
        // The middle section is 11 chars, so only it goes through the line pass.
        let text = "aaaa\n\nbb\ncc\ndd\nee\n\nzz";
        let chunks = split(text, params(10, 4));
        assert_eq!(
            texts(&chunks),
            vec!["aaaa\n\nbb", "bb\ncc\ndd", "dd\nee\n\nzz"]
        );
        assert!(chunks.iter().all(|c| c.char_len() <= 10 && !c.oversized));
        assert!(chunks[1].text.starts_with("bb"));
        assert!(chunks[2].text.starts_with("dd"));
    }

    #[test]
    fn test_size_bound_or_atomic_oversize() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!("Entry {}:\nname: Person {}\nage: {}\n\n", i + 1, i, 20 + i));
        }
        text.push_str(&"x".repeat(300));
        let p = params(120, 40);
        let chunks = split(&text, p);
        for c in &chunks {
            assert!(
                c.char_len() <= p.max_chars || (c.oversized && !c.text.contains('\n')),
                "chunk {} violates bound: {:?}",
                c.index,
                c.text
            );
        }
        assert!(chunks.last().unwrap().oversized);
    }

    #[test]
    fn test_no_silent_drops() {
        let records: Vec<String> = (0..50)
            .map(|i| format!("Entry {}:\ncity: Town{}\nscore: {}", i + 1, i, i * 7))
            .collect();
        let text = records.join("\n\n");
        let chunks = split(&text, params(90, 30));
        for line in text.lines().filter(|l| !l.is_empty()) {
            assert!(
                chunks.iter().any(|c| c.text.lines().any(|cl| cl == line)),
                "line dropped: {}",
                line
            );
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split(&text, params(40, 10));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_multibyte_counted_as_chars() {
        let text = "┌────┐\n\n│ hé │\n\n└────┘";
        let chunks = split(text, params(14, 0));
        assert_eq!(texts(&chunks), vec!["┌────┐\n\n│ hé │", "└────┘"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = split(text, params(12, 6));
        let c2 = split(text, params(12, 6));
        assert_eq!(c1, c2);
    }
}
