//! Human-readable transcript of a comprehensive analysis run.
//!
//! Each step contributes one block:
//!
//! ```text
//! === MARKET SIZE ANALYSIS ===
//! Timestamp: 2026-02-21T10:00:00.000Z
//! Status: completed
//! Confidence: high
//!
//! <full text>
//!
//! ==================================================
//! ```

use crate::analysis::StepResult;
use crate::step_key::section_header;

const SEPARATOR_WIDTH: usize = 50;

/// Accumulates step blocks in execution order.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the block for one finished step.
    pub fn push_step(&mut self, name: &str, result: &StepResult) {
        self.text.push_str(&format_block(name, result));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Format a single step block, including the trailing separator.
pub fn format_block(name: &str, result: &StepResult) -> String {
    let mut body = result.full_text();
    if body.trim().is_empty() {
        body = result.summary();
    }
    format!(
        "{header}\nTimestamp: {ts}\nStatus: {status}\nConfidence: {confidence}\n\n{body}\n\n{sep}\n\n",
        header = section_header(name),
        ts = result.timestamp(),
        status = result.status(),
        confidence = result.confidence(),
        body = body.trim_end(),
        sep = "=".repeat(SEPARATOR_WIDTH),
    )
}

/// Word count with the semantics of splitting on `/\s+/`.
///
/// Every maximal whitespace run is one split point, so the count is the number
/// of runs plus one. Leading or trailing whitespace therefore contributes an
/// empty piece, and an empty string counts as one.
pub fn word_count(text: &str) -> usize {
    let mut runs = 0;
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_run {
                runs += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    runs + 1
}

/// Character count in UTF-16 code units, matching a JavaScript string length.
pub fn character_count(text: &str) -> usize {
    text.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_plain() {
        assert_eq!(word_count("one two three"), 3);
        assert_eq!(word_count("one   two\n\nthree"), 3);
    }

    #[test]
    fn word_count_edges() {
        assert_eq!(word_count(""), 1);
        assert_eq!(word_count(" leading"), 2);
        assert_eq!(word_count("trailing\n"), 2);
        assert_eq!(word_count("   "), 2);
    }

    #[test]
    fn character_count_utf16() {
        assert_eq!(character_count("abc"), 3);
        assert_eq!(character_count("café"), 4);
        // Outside the BMP: one scalar, two UTF-16 units.
        assert_eq!(character_count("🚀"), 2);
    }

    #[test]
    fn block_layout() {
        let result = StepResult::completed("short", "The full analysis.");
        let block = format_block("Market Size", &result);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "=== MARKET SIZE ANALYSIS ===");
        assert!(lines[1].starts_with("Timestamp: "));
        assert_eq!(lines[2], "Status: completed");
        assert_eq!(lines[3], "Confidence: high");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "The full analysis.");
        assert_eq!(lines[7], "=".repeat(50));
    }

    #[test]
    fn block_falls_back_to_summary() {
        let result = StepResult::completed("only summary", "");
        let block = format_block("Founders", &result);
        assert!(block.contains("\n\nonly summary\n\n"));
    }

    #[test]
    fn transcript_keeps_step_order() {
        let mut t = Transcript::new();
        t.push_step("Fact Check", &StepResult::completed("a", "a"));
        t.push_step("Competition", &StepResult::error("b failed"));
        let text = t.into_string();
        let fact = text.find("FACT CHECK").unwrap();
        let comp = text.find("COMPETITION").unwrap();
        assert!(fact < comp);
        assert!(text.contains("Status: error\nConfidence: low"));
    }
}
