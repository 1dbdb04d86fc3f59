pub mod analysis;
pub mod record;
pub mod step_key;
pub mod subject;
pub mod transcript;

pub use analysis::{BackendStatus, Confidence, StepResult, StepStatus};
pub use record::{
    AggregateAnalysisRecord, AggregateStatus, DataSources, IndividualAnalysisRecord, StepResults, Stored,
};
pub use step_key::step_key;
pub use subject::{ArtifactMetadata, StartupProfile};
pub use transcript::Transcript;
