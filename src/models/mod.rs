pub mod settings;
pub mod task;

pub use settings::AutoApplySettings;
pub use task::{ApplicationTask, FailureKind, Platform, TaskStatus, TimelineEntry};
