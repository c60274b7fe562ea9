//! Segment Splitter
//!
//! Splits a finished model response into ordered prose/code segments on
//! triple-backtick fences. Pieces alternate by position, starting outside a
//! code block; each piece is trimmed and empty pieces are dropped, so a
//! response that opens with a fence yields a code segment first.
//!
//! An unterminated fence is accepted: the trailing piece keeps whatever
//! parity its position gives it.

const FENCE: &str = "```";

/// One rendered unit of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub code: bool,
}

impl Segment {
    pub fn prose(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: false,
        }
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: true,
        }
    }
}

/// Split response text on ``` fences into alternating prose/code segments.
///
/// Empty or whitespace-only input produces no segments.
pub fn split_segments(full: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for (i, piece) in full.split(FENCE).enumerate() {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        segments.push(Segment {
            text: trimmed.to_string(),
            code: i % 2 == 1,
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prose_code_prose() {
        let segments = split_segments("a```b```c");
        assert_eq!(
            segments,
            vec![Segment::prose("a"), Segment::code("b"), Segment::prose("c")]
        );
    }

    #[test]
    fn test_leading_fence_yields_code_first() {
        let segments = split_segments("```only code```");
        assert_eq!(segments, vec![Segment::code("only code")]);
    }

    #[test]
    fn test_plain_prose() {
        let segments = split_segments("no fences here");
        assert_eq!(segments, vec![Segment::prose("no fences here")]);
    }

    #[test]
    fn test_pieces_are_trimmed() {
        let segments = split_segments("  intro  ```\nfn main() {}\n```  outro  ");
        assert_eq!(
            segments,
            vec![
                Segment::prose("intro"),
                Segment::code("fn main() {}"),
                Segment::prose("outro"),
            ]
        );
    }

    #[test]
    fn test_whitespace_pieces_dropped() {
        // The gap between the two blocks is whitespace only and produces nothing.
        let segments = split_segments("```one```   \n  ```two```");
        assert_eq!(segments, vec![Segment::code("one"), Segment::code("two")]);
    }

    #[test]
    fn test_unterminated_fence() {
        let segments = split_segments("look:```let x = 1;");
        assert_eq!(
            segments,
            vec![Segment::prose("look:"), Segment::code("let x = 1;")]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(split_segments("").is_empty());
        assert!(split_segments("   \n\t  ").is_empty());
    }

    #[test]
    fn test_language_tag_stays_with_code() {
        // A language tag after the fence is part of the code piece.
        let segments = split_segments("```python\nprint(1)\n```");
        assert_eq!(segments, vec![Segment::code("python\nprint(1)")]);
    }
}
