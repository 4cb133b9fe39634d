//! Boundary-aware text chunker.
//!
//! Splits merged document text into [`Chunk`]s of `target_size..=max_size`
//! characters. The text is first divided into document sections at each
//! `===== BEGIN FILE:` marker line, so only the last chunk of a document may
//! fall below `target_size`.
//!
//! Inside a section, once a chunk has reached `target_size` characters the
//! chunker looks forward (up to `max_size`) for the nearest paragraph break or
//! sentence end. Failing that it takes the nearest word boundary, and as a
//! last resort hard-splits at `max_size`. Chunks are trimmed of surrounding
//! whitespace only, so the chunks cover the source text with no gaps other
//! than whitespace.
//!
//! A whitespace run longer than `max_size - target_size` that spans the whole
//! search window leaves no boundary to pick, so the hard split lands inside
//! the run and trimming can leave a non-final chunk below `target_size`.

use crate::models::Chunk;

/// Line prefix that opens a new source document in the merged text.
pub const DOCUMENT_MARKER: &str = "===== BEGIN FILE:";

/// Split text into chunks. Sizes are measured in characters.
/// Returns chunks with contiguous `sequence_index` values starting at 0.
pub fn chunk_text(text: &str, target_size: usize, max_size: usize) -> Vec<Chunk> {
    let target_size = target_size.max(1);
    let max_size = max_size.max(target_size);

    let mut chunks = Vec::new();
    for (offset, section) in split_documents(text) {
        chunk_section(section, offset, target_size, max_size, &mut chunks);
    }
    chunks
}

/// Divide text into `(byte_offset, section)` pairs at document marker lines.
/// The marker line belongs to the section it opens.
fn split_documents(text: &str) -> Vec<(usize, &str)> {
    let mut starts = vec![0usize];
    let mut line_start = 0usize;
    for line in text.split_inclusive('\n') {
        if line_start > 0 && line.starts_with(DOCUMENT_MARKER) {
            starts.push(line_start);
        }
        line_start += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            (start, &text[start..end])
        })
        .collect()
}

fn chunk_section(
    section: &str,
    base_offset: usize,
    target_size: usize,
    max_size: usize,
    out: &mut Vec<Chunk>,
) {
    let chars: Vec<(usize, char)> = section.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map(|(b, _)| *b).unwrap_or(section.len());

    let content_end = match chars.iter().rposition(|(_, c)| !c.is_whitespace()) {
        Some(last) => last + 1,
        None => return,
    };

    let mut start = 0usize;
    loop {
        while start < content_end && chars[start].1.is_whitespace() {
            start += 1;
        }
        if start >= content_end {
            break;
        }

        let end = if content_end - start <= max_size {
            content_end
        } else {
            find_split(&chars, start, target_size, max_size)
        };

        let piece = section[byte_at(start)..byte_at(end)].trim_end();
        out.push(Chunk::new(out.len(), base_offset + byte_at(start), piece));
        start = end;
    }
}

/// Choose the end (exclusive char index) of a chunk beginning at `start`.
/// Caller guarantees `start + max_size` is inside the section.
fn find_split(chars: &[(usize, char)], start: usize, target_size: usize, max_size: usize) -> usize {
    let lo = start + target_size;
    let hi = start + max_size;

    if let Some(i) = (lo..=hi).find(|&i| is_natural_boundary(chars, i)) {
        return i;
    }
    if let Some(i) = (lo..=hi).find(|&i| is_word_boundary(chars, i)) {
        return i;
    }
    hi
}

/// A split between `chars[i - 1]` (non-whitespace) and whitespace at `chars[i]`.
fn is_word_boundary(chars: &[(usize, char)], i: usize) -> bool {
    match (chars.get(i.wrapping_sub(1)), chars.get(i)) {
        (Some((_, before)), Some((_, after))) => !before.is_whitespace() && after.is_whitespace(),
        _ => false,
    }
}

/// A word boundary that also ends a sentence or a paragraph.
fn is_natural_boundary(chars: &[(usize, char)], i: usize) -> bool {
    if !is_word_boundary(chars, i) {
        return false;
    }
    let before = chars[i - 1].1;
    if matches!(before, '.' | '!' | '?') {
        return true;
    }

    // Paragraph break: the whitespace run starting at i spans two newlines.
    let newlines = chars[i..]
        .iter()
        .take_while(|(_, c)| c.is_whitespace())
        .filter(|(_, c)| *c == '\n')
        .count();
    newlines >= 2
}
