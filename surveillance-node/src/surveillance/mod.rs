pub mod activity_log;
pub mod orchestrator;
pub mod registry;

pub use activity_log::{ActivityLog, ActivityLogEntry, LogCategory};
pub use orchestrator::{CameraSummary, FailedStart, StartReport, StatusSnapshot, SurveillanceOrchestrator};
pub use registry::{CameraRuntimeState, CameraStats, ResultRegistry};
