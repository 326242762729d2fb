//! Text chunking for streamed delivery
//!
//! Backends that produce their whole answer in one shot still stream
//! it out in fixed-size pieces so clients render progressively.

/// Split text into chunks of at most `chunk_chars` characters
///
/// Splits on character boundaries, never inside a multi-byte UTF-8
/// sequence. The final chunk carries the remainder; empty input yields
/// no chunks.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    assert!(chunk_chars > 0, "chunk size must be positive");

    let mut chunks = Vec::new();
    let mut current = String::with_capacity(chunk_chars);
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
