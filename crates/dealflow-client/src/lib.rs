//! Client layer: REST access to the analysis service and the retrying wrapper around it.

pub mod artifact;
pub mod config;
pub mod retry;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use artifact::{ArtifactSource, NoArtifacts};
pub use config::ClientConfig;
pub use retry::{AnalysisOutcome, AnalysisResponse, FallbackResponse, RetryingAnalysisClient};
pub use transport::{AnalysisTransport, Endpoint, HttpError, Method};

#[cfg(feature = "http")]
pub use http::HttpClient;
