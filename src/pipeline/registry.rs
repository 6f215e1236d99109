//! Task registry and the per-task pipeline worker.
//!
//! Each submitted recording gets its own worker; tasks proceed
//! independently with no ordering between them. The registry map hands out
//! one lock per task, so a worker writing progress never contends with
//! readers of unrelated tasks. Completed and errored tasks stay queryable
//! for a retention window, then an eviction sweep removes them.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::merge;
use super::task::{ProcessOptions, ProcessingTask};
use crate::engine::{DiarizeOptions, SpeechEngine, TranscribeOptions};
use crate::error::{ScribeError, Stage};

pub struct TaskRegistry {
    tasks: RwLock<HashMap<Uuid, Arc<Mutex<ProcessingTask>>>>,
    retention: Duration,
}

impl TaskRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Register a recording for processing and spawn its worker. Returns
    /// the task id the client polls.
    pub fn submit(
        &self,
        engine: Arc<dyn SpeechEngine>,
        audio: Vec<u8>,
        options: ProcessOptions,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let task = Arc::new(Mutex::new(ProcessingTask::new(id)));
        self.tasks.write().insert(id, Arc::clone(&task));

        info!(task = %id, bytes = audio.len(), "processing task submitted");
        tokio::spawn(run_pipeline(task, engine, audio, options));

        id
    }

    /// Snapshot of a task's current state. `None` means the id was never
    /// submitted or has been evicted; callers must not confuse this with a
    /// task at 0% progress.
    pub fn get(&self, id: Uuid) -> Option<ProcessingTask> {
        self.tasks.read().get(&id).map(|t| t.lock().clone())
    }

    /// Acknowledge and remove a terminal task before its retention expires.
    /// A task still in progress is left alone.
    pub fn acknowledge(&self, id: Uuid) -> bool {
        let mut tasks = self.tasks.write();
        match tasks.get(&id) {
            Some(task) if task.lock().is_terminal() => {
                tasks.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Remove terminal tasks whose retention window has passed. Returns the
    /// number evicted.
    pub fn evict(&self) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, task| {
            let task = task.lock();
            match task.finished_at {
                Some(finished) => finished.elapsed() < self.retention,
                None => true,
            }
        });
        let evicted = before - tasks.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired tasks");
        }
        evicted
    }

    /// Background sweep driving `evict` on an interval.
    pub fn spawn_eviction_sweep(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.evict();
            }
        })
    }

    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }
}

/// Drive one recording through transcribe → diarize → merge, updating the
/// task under its lock at each transition. Errors stop the pipeline at the
/// failing stage with the engine message kept verbatim.
async fn run_pipeline(
    task: Arc<Mutex<ProcessingTask>>,
    engine: Arc<dyn SpeechEngine>,
    audio: Vec<u8>,
    options: ProcessOptions,
) {
    let id = task.lock().id;

    task.lock().set_stage(5, "Transcribing audio");
    let transcribe_opts = TranscribeOptions {
        language: options.language.clone(),
        model_hint: options.model_hint.clone(),
    };
    let transcription = match engine.transcribe(&audio, &transcribe_opts).await {
        Ok(t) => t,
        Err(e) => {
            let err = ScribeError::PipelineStage {
                stage: Stage::Transcribe,
                message: e.to_string(),
            };
            error!(task = %id, "{}", err);
            task.lock().fail("Transcription failed", e.to_string());
            return;
        }
    };
    task.lock().set_stage(30, "Transcription complete");

    task.lock().set_stage(40, "Identifying speakers");
    let diarize_opts = DiarizeOptions {
        min_speakers: options.min_speakers,
        max_speakers: options.max_speakers,
    };
    let diarization = match engine.diarize(&audio, &diarize_opts).await {
        Ok(d) => d,
        Err(e) => {
            let err = ScribeError::PipelineStage {
                stage: Stage::Diarize,
                message: e.to_string(),
            };
            error!(task = %id, "{}", err);
            task.lock().fail("Speaker identification failed", e.to_string());
            return;
        }
    };
    task.lock().set_stage(70, "Speaker identification complete");

    task.lock().set_stage(80, "Merging transcript and speakers");
    let result = merge::merge(transcription, diarization);

    info!(
        task = %id,
        segments = result.segments.len(),
        speakers = result.speakers.len(),
        "processing task completed"
    );
    task.lock().complete(result);
}
