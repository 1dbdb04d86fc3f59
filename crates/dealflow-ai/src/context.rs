//! Builds the shared context blob every analysis step receives.

use dealflow_client::ArtifactSource;
use dealflow_core::subject::present;
use dealflow_core::{ArtifactMetadata, DataSources, StartupProfile};
use tracing::{debug, warn};

/// Context text plus the record of which optional inputs fed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisContext {
    pub text: String,
    pub data_sources: DataSources,
}

/// Assemble the context for `subject`.
///
/// Present profile fields are emitted under fixed labels, then transcripts,
/// then a description of the pitch deck. Absent fields are skipped. The deck
/// line is always written; it reads `Not available` when there is no deck or
/// its metadata cannot be fetched.
pub async fn build_context(
    subject: &StartupProfile,
    subject_id: &str,
    artifacts: &dyn ArtifactSource,
) -> AnalysisContext {
    let mut lines: Vec<String> = Vec::new();

    let labelled = [
        ("COMPANY", &subject.company_name),
        ("DESCRIPTION", &subject.description),
        ("INDUSTRY", &subject.industry),
        ("STAGE", &subject.stage),
        ("FUNDING ASK", &subject.funding_ask),
        ("LOCATION", &subject.location),
        ("WEBSITE", &subject.website),
        ("FOUNDERS", &subject.founders),
        ("TEAM SIZE", &subject.team_size),
    ];
    for (label, field) in labelled {
        if let Some(value) = present(field) {
            lines.push(format!("{label}: {value}"));
        }
    }

    if let Some(email) = present(&subject.email_transcript) {
        lines.push(format!("\nEMAIL TRANSCRIPT:\n{email}"));
    }
    if let Some(call) = present(&subject.call_transcript) {
        lines.push(format!("\nCALL TRANSCRIPT:\n{call}"));
    }

    let deck = match artifacts.pitch_deck_metadata(subject_id).await {
        Ok(deck) => deck,
        Err(e) => {
            warn!(subject_id, error = %e, "pitch deck metadata unavailable");
            None
        }
    };
    lines.push(match &deck {
        Some(meta) => format!("\n{}", describe_artifact(meta)),
        None => "\nPITCH DECK: Not available".to_string(),
    });

    let data_sources = DataSources {
        profile: true,
        email_transcript: subject.has_email_transcript(),
        call_transcript: subject.has_call_transcript(),
        pitch_deck: deck.is_some(),
    };
    let text = lines.join("\n");
    debug!(subject_id, chars = text.len(), ?data_sources, "built analysis context");

    AnalysisContext { text, data_sources }
}

/// One-line description of the deck by name, type, and size. Content is never read.
pub fn describe_artifact(meta: &ArtifactMetadata) -> String {
    format!(
        "PITCH DECK: {} (type: {}, size: {})",
        meta.name,
        meta.content_type,
        format_size(meta.size_bytes)
    )
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} bytes")
    }
}
