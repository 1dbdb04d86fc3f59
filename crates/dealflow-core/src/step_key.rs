//! Step key normalisation.
//!
//! Converts human-readable step names ("Fact Check", "Investment
//! Recommendation") into the keys used for result maps and individual
//! record types ("fact_check", "investment_recommendation").

/// Normalise a step name into its result-map key.
///
/// Lowercases ASCII letters and collapses every run of whitespace into a
/// single underscore. Leading and trailing whitespace is dropped.
pub fn step_key(name: &str) -> String {
    name.split_whitespace()
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Header line used for a step's block in the analysis transcript.
///
/// "Market Size" → "=== MARKET SIZE ANALYSIS ==="
pub fn section_header(name: &str) -> String {
    format!("=== {} ANALYSIS ===", name.trim().to_uppercase())
}
