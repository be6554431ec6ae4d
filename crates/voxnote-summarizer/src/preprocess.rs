use tracing::{debug, info};

/// Tokens dropped before summarization. Matching is per whitespace token, so
/// the two-word entry never matches.
pub const FILLER_WORDS: &[&str] = &[
    "um",
    "uh",
    "like",
    "you know",
    "basically",
    "actually",
    "literally",
];

/// Word budget for text sent to the summarization endpoint.
pub const MAX_WORDS: usize = 1000;

const STRIP_CHARS: &[char] = &['.', ',', '!', '?'];

/// Transcript text with fillers removed and at most [`MAX_WORDS`] words.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanedText(String);

impl CleanedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn word_count(&self) -> usize {
        voxnote_core::text::word_count(&self.0)
    }
}

impl AsRef<str> for CleanedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_filler(token: &str) -> bool {
    let normalized = token.trim_matches(STRIP_CHARS).to_lowercase();
    FILLER_WORDS.contains(&normalized.as_str())
}

/// Drop filler tokens and cap the word count. Surviving tokens keep their
/// casing and punctuation and are joined with single spaces.
pub fn clean(text: &str) -> CleanedText {
    let mut total = 0usize;
    let mut kept: Vec<&str> = text
        .split_whitespace()
        .inspect(|_| total += 1)
        .filter(|token| !is_filler(token))
        .collect();

    if kept.len() > MAX_WORDS {
        info!(words = kept.len(), limit = MAX_WORDS, "truncating transcript");
        kept.truncate(MAX_WORDS);
    }

    debug!(before = total, after = kept.len(), "cleaned transcript");
    CleanedText(kept.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_fillers() {
        assert_eq!(clean("um this is uh a test").as_str(), "this is a test");
    }

    #[test]
    fn filler_match_ignores_case_and_punctuation() {
        assert_eq!(
            clean("Um, so I was, LIKE! basically done. Actually?").as_str(),
            "so I was, done."
        );
    }

    #[test]
    fn survivors_keep_punctuation_and_case() {
        assert_eq!(clean("Hello, World! um").as_str(), "Hello, World!");
    }

    #[test]
    fn two_word_filler_is_not_matched() {
        assert_eq!(clean("you know it works").as_str(), "you know it works");
    }

    #[test]
    fn filler_inside_word_is_kept() {
        assert_eq!(clean("likely umbrella").as_str(), "likely umbrella");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(clean("  one\t\ttwo \n three  ").as_str(), "one two three");
    }

    #[test]
    fn empty_and_all_filler_inputs() {
        assert!(clean("").is_empty());
        assert!(clean("   ").is_empty());
        assert!(clean("um uh like").is_empty());
    }

    #[test]
    fn truncates_to_word_cap_in_order() {
        let words: Vec<String> = (0..1500).map(|i| format!("w{i}")).collect();
        let cleaned = clean(&words.join(" "));
        assert_eq!(cleaned.word_count(), MAX_WORDS);
        let out: Vec<&str> = cleaned.as_str().split(' ').collect();
        assert_eq!(out.first(), Some(&"w0"));
        assert_eq!(out.last(), Some(&"w999"));
    }

    #[test]
    fn cap_applies_after_filler_removal() {
        let mut words = vec!["um"; 600];
        words.extend(std::iter::repeat("word").take(1000));
        assert_eq!(clean(&words.join(" ")).word_count(), 1000);
    }

    #[test]
    fn idempotent() {
        let samples = [
            "um this is uh a test",
            "Like, actually... it was literally fine!",
            "",
            "plain sentence with no fillers",
        ];
        for s in samples {
            let once = clean(s);
            let twice = clean(once.as_str());
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }
}
