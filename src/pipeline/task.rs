//! Processing task state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use super::merge::ProcessingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
}

/// Options accepted when a recording is submitted.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub language: Option<String>,
    pub model_hint: Option<String>,
    pub min_speakers: u32,
    pub max_speakers: u32,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            language: None,
            model_hint: None,
            min_speakers: 1,
            max_speakers: 10,
        }
    }
}

/// State of one submitted recording, owned by the registry and mutated only
/// by the worker running it (under the task's own lock).
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingTask {
    pub id: Uuid,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub stage_message: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the task reached a terminal state; drives eviction
    #[serde(skip)]
    pub finished_at: Option<Instant>,
}

impl ProcessingTask {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            status: TaskStatus::Processing,
            progress_percent: 0,
            stage_message: "Queued".to_string(),
            submitted_at: Utc::now(),
            result: None,
            error_message: None,
            finished_at: None,
        }
    }

    pub fn set_stage(&mut self, progress_percent: u8, message: impl Into<String>) {
        self.progress_percent = progress_percent;
        self.stage_message = message.into();
    }

    /// Attach the final result; progress only reaches 100 here.
    pub fn complete(&mut self, result: ProcessingResult) {
        self.status = TaskStatus::Completed;
        self.progress_percent = 100;
        self.stage_message = "Processing complete".to_string();
        self.result = Some(result);
        self.finished_at = Some(Instant::now());
    }

    /// Terminal failure. The engine's message is preserved verbatim; the
    /// stage message records where the pipeline stopped.
    pub fn fail(&mut self, stage_message: impl Into<String>, error_message: impl Into<String>) {
        self.status = TaskStatus::Error;
        self.stage_message = stage_message.into();
        self.error_message = Some(error_message.into());
        self.finished_at = Some(Instant::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Error)
    }
}
