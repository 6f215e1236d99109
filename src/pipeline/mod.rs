//! Asynchronous processing pipeline.
//!
//! A finished recording is submitted as bytes and flows through
//! transcribe → diarize → merge on a dedicated worker while the client
//! polls the task registry for progress. Tasks are not cancellable
//! mid-stage and are never retried automatically; a failed task reports its
//! stage and the engine's error verbatim, and the client resubmits if it
//! wants another attempt.

pub mod merge;
pub mod registry;
pub mod task;

pub use merge::{ProcessingResult, ResultSegment, Speaker};
pub use registry::TaskRegistry;
pub use task::{ProcessOptions, ProcessingTask, TaskStatus};
