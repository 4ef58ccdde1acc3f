//! Sentence segmentation
//!
//! A reading position is a zero-based index into `segment(text)`. The
//! progress store, the speech engine and the controller all derive
//! positions from this one function, so a saved index stays meaningful
//! as long as the text and this rule are unchanged.

/// Characters that terminate a sentence. Runs of them count as one break.
pub const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

fn is_terminator(ch: char) -> bool {
    SENTENCE_TERMINATORS.contains(&ch)
}

/// Split text into ordered, trimmed, non-empty sentences
///
/// Splits on runs of `.`, `!` and `?`. Text produces no sentences unless
/// some terminator closes a fragment containing a letter; once one does,
/// every non-empty fragment is kept, including a trailing unterminated
/// one.
///
/// ```
/// use readion_common::text::segment;
///
/// assert_eq!(segment("A. B! C?"), vec!["A", "B", "C"]);
/// assert_eq!(segment("A..B"), vec!["A", "B"]);
/// assert!(segment("Hello world").is_empty());
/// assert!(segment("?Hello").is_empty());
/// ```
pub fn segment(text: &str) -> Vec<String> {
    if !has_terminated_sentence(text) {
        return Vec::new();
    }

    text.split(is_terminator)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if a terminator closes a fragment with at least one letter
fn has_terminated_sentence(text: &str) -> bool {
    let mut fragment_has_letter = false;
    for ch in text.chars() {
        if is_terminator(ch) {
            if fragment_has_letter {
                return true;
            }
        } else if ch.is_alphabetic() {
            fragment_has_letter = true;
        }
    }
    false
}

/// Number of sentences `segment` would produce
pub fn sentence_count(text: &str) -> usize {
    segment(text).len()
}

/// Clamp a requested position into `0..count`
///
/// Negative requests land on the first sentence, requests past the end on
/// the last one. With no sentences the only valid position is 0.
pub fn clamp_position(requested: i64, count: usize) -> usize {
    if count == 0 || requested <= 0 {
        return 0;
    }
    let last = count - 1;
    usize::try_from(requested).map_or(last, |pos| pos.min(last))
}

/// Join the sentences from `start` to the end with single spaces
///
/// This is the substring actually handed to the synthesizer, so boundary
/// events it reports are relative to `start`.
pub fn join_from(sentences: &[String], start: usize) -> String {
    sentences
        .get(start..)
        .map(|tail| tail.join(" "))
        .unwrap_or_default()
}
