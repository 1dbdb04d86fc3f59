//! Comprehensive startup analysis: the step sequence, the shared context, and
//! the sequential orchestrator that runs steps and persists their results.

pub mod context;
pub mod orchestrator;
pub mod progress;
pub mod steps;

pub use context::{AnalysisContext, build_context};
pub use orchestrator::{AnalysisError, AnalysisReport, Orchestrator};
pub use progress::{
    CancellationFlag, NoopProgress, ProgressEvent, ProgressReporter, ProgressSnapshot,
    WatchProgress,
};
pub use steps::{AnalysisStep, COMPREHENSIVE_STEPS, StepError, StepSpec};
