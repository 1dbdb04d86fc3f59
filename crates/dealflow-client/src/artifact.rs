//! Pitch deck metadata lookup.

use async_trait::async_trait;
use dealflow_core::ArtifactMetadata;

use crate::transport::HttpError;

/// Looks up descriptive metadata for a subject's pitch deck.
///
/// `Ok(None)` means the subject has no deck.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn pitch_deck_metadata(
        &self,
        subject_id: &str,
    ) -> Result<Option<ArtifactMetadata>, HttpError>;
}

/// Artifact source for deployments without blob storage.
pub struct NoArtifacts;

#[async_trait]
impl ArtifactSource for NoArtifacts {
    async fn pitch_deck_metadata(
        &self,
        _subject_id: &str,
    ) -> Result<Option<ArtifactMetadata>, HttpError> {
        Ok(None)
    }
}
