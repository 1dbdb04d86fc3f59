//! The subject of an analysis: a startup profile and its pitch deck.

use serde::{Deserialize, Serialize};

/// Startup profile as submitted by a founder.
///
/// `id` is assigned when the profile is submitted; a profile without one has
/// never been saved and cannot be analysed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartupProfile {
    pub id: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub stage: Option<String>,
    pub funding_ask: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub founders: Option<String>,
    pub team_size: Option<String>,
    pub email_transcript: Option<String>,
    pub call_transcript: Option<String>,
}

impl StartupProfile {
    /// The submitted id, if any. Blank ids count as missing.
    pub fn submitted_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn has_email_transcript(&self) -> bool {
        present(&self.email_transcript).is_some()
    }

    pub fn has_call_transcript(&self) -> bool {
        present(&self.call_transcript).is_some()
    }
}

/// Descriptive metadata for the pitch deck blob. The content is never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Trimmed field value, or `None` when absent or blank.
pub fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
