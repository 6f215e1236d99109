// Integration tests for the processing pipeline
//
// Engine stubs stand in for the external model server so the stage
// machinery can be exercised end to end: progress transitions, task
// isolation, error propagation, eviction, and the empty-recording case.

use async_trait::async_trait;
use meetscribe::audio::wav;
use meetscribe::engine::EnergyDiarizer;
use meetscribe::{
    Diarization, DiarizeOptions, ProcessOptions, ProcessingTask, ScribeError, SpeakerTurn,
    SpeechEngine, TaskRegistry, TaskStatus, TranscribeOptions, TranscribedSegment, Transcription,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Configurable stand-in for the external engines.
struct StubEngine {
    transcription: Transcription,
    diarization: Diarization,
    delay: Duration,
    transcribe_error: Option<String>,
    diarize_error: Option<String>,
}

impl StubEngine {
    fn ok(transcription: Transcription, diarization: Diarization) -> Self {
        Self {
            transcription,
            diarization,
            delay: Duration::ZERO,
            transcribe_error: None,
            diarize_error: None,
        }
    }
}

#[async_trait]
impl SpeechEngine for StubEngine {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _opts: &TranscribeOptions,
    ) -> meetscribe::Result<Transcription> {
        tokio::time::sleep(self.delay).await;
        if let Some(msg) = &self.transcribe_error {
            return Err(ScribeError::Engine(msg.clone()));
        }
        Ok(self.transcription.clone())
    }

    async fn diarize(
        &self,
        _audio: &[u8],
        _opts: &DiarizeOptions,
    ) -> meetscribe::Result<Diarization> {
        tokio::time::sleep(self.delay).await;
        if let Some(msg) = &self.diarize_error {
            return Err(ScribeError::Engine(msg.clone()));
        }
        Ok(self.diarization.clone())
    }
}

fn one_segment_transcription(text: &str) -> Transcription {
    Transcription {
        text: text.to_string(),
        segments: vec![TranscribedSegment {
            start: 0.0,
            end: 2.0,
            text: text.to_string(),
            words: None,
        }],
        language: "en".to_string(),
    }
}

fn one_speaker_diarization() -> Diarization {
    Diarization {
        turns: vec![SpeakerTurn {
            start: 0.0,
            end: 2.0,
            speaker: "SPEAKER_00".to_string(),
        }],
    }
}

async fn wait_terminal(registry: &TaskRegistry, id: Uuid) -> ProcessingTask {
    for _ in 0..500 {
        if let Some(task) = registry.get(id) {
            if task.is_terminal() {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not reach a terminal state", id);
}

#[tokio::test]
async fn test_successful_pipeline_reaches_100_percent() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    let engine = Arc::new(StubEngine::ok(
        one_segment_transcription("hello world"),
        one_speaker_diarization(),
    ));

    let id = registry.submit(engine, vec![0u8; 64], ProcessOptions::default());
    let task = wait_terminal(&registry, id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress_percent, 100);
    assert!(task.error_message.is_none());

    let result = task.result.expect("completed task carries a result");
    assert_eq!(result.text, "hello world");
    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].speaker_id, "SPEAKER_00");
    assert_eq!(result.speakers.len(), 1);
    assert_eq!(result.speakers[0].name, "Speaker 1");
}

#[tokio::test]
async fn test_unknown_task_id_is_distinguishable() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    assert!(registry.get(Uuid::new_v4()).is_none());
}

#[tokio::test]
async fn test_concurrent_tasks_are_isolated() {
    let registry = Arc::new(TaskRegistry::new(Duration::from_secs(600)));

    let slow = Arc::new(StubEngine {
        delay: Duration::from_millis(200),
        ..StubEngine::ok(one_segment_transcription("slow task"), one_speaker_diarization())
    });
    let fast = Arc::new(StubEngine::ok(
        one_segment_transcription("fast task"),
        one_speaker_diarization(),
    ));

    let slow_id = registry.submit(slow, vec![1u8; 8], ProcessOptions::default());
    let fast_id = registry.submit(fast, vec![2u8; 8], ProcessOptions::default());

    let fast_task = wait_terminal(&registry, fast_id).await;
    assert_eq!(fast_task.status, TaskStatus::Completed);

    // The fast task finishing says nothing about the slow one
    let slow_task = registry.get(slow_id).expect("slow task still registered");
    assert_eq!(slow_task.status, TaskStatus::Processing);
    assert!(slow_task.progress_percent < 100);

    let slow_task = wait_terminal(&registry, slow_id).await;
    assert_eq!(
        slow_task.result.unwrap().text,
        "slow task",
        "tasks must not leak results into each other"
    );
    assert_eq!(fast_task.result.unwrap().text, "fast task");
}

#[tokio::test]
async fn test_transcription_failure_preserves_engine_message() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    let engine = Arc::new(StubEngine {
        transcribe_error: Some("CUDA out of memory".to_string()),
        ..StubEngine::ok(Transcription::default(), Diarization::default())
    });

    let id = registry.submit(engine, vec![0u8; 16], ProcessOptions::default());
    let task = wait_terminal(&registry, id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert!(task.result.is_none(), "no partial result on failure");
    assert_eq!(task.stage_message, "Transcription failed");
    let message = task.error_message.unwrap();
    assert!(
        message.contains("CUDA out of memory"),
        "engine message must survive verbatim, got: {}",
        message
    );
}

#[tokio::test]
async fn test_diarization_failure_stops_the_pipeline() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    let engine = Arc::new(StubEngine {
        diarize_error: Some("voice-print model missing".to_string()),
        ..StubEngine::ok(one_segment_transcription("text"), Diarization::default())
    });

    let id = registry.submit(engine, vec![0u8; 16], ProcessOptions::default());
    let task = wait_terminal(&registry, id).await;

    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.stage_message, "Speaker identification failed");
    assert!(task
        .error_message
        .unwrap()
        .contains("voice-print model missing"));
}

#[tokio::test]
async fn test_terminal_tasks_are_evicted_after_retention() {
    let registry = TaskRegistry::new(Duration::ZERO);
    let engine = Arc::new(StubEngine::ok(
        one_segment_transcription("short lived"),
        one_speaker_diarization(),
    ));

    let id = registry.submit(engine, vec![0u8; 8], ProcessOptions::default());
    wait_terminal(&registry, id).await;

    assert_eq!(registry.evict(), 1);
    assert!(registry.get(id).is_none());
    assert_eq!(registry.task_count(), 0);
}

#[tokio::test]
async fn test_in_flight_tasks_survive_eviction() {
    let registry = TaskRegistry::new(Duration::ZERO);
    let engine = Arc::new(StubEngine {
        delay: Duration::from_millis(500),
        ..StubEngine::ok(one_segment_transcription("still running"), one_speaker_diarization())
    });

    let id = registry.submit(engine, vec![0u8; 8], ProcessOptions::default());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(registry.evict(), 0, "running tasks are never evicted");
    assert!(registry.get(id).is_some());
}

#[tokio::test]
async fn test_acknowledge_removes_only_terminal_tasks() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    let engine = Arc::new(StubEngine::ok(
        one_segment_transcription("done"),
        one_speaker_diarization(),
    ));

    let id = registry.submit(engine, vec![0u8; 8], ProcessOptions::default());
    wait_terminal(&registry, id).await;

    assert!(registry.acknowledge(id));
    assert!(registry.get(id).is_none());
    assert!(!registry.acknowledge(id), "already removed");
}

#[tokio::test]
async fn test_task_snapshot_serializes_the_polling_contract() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    let engine = Arc::new(StubEngine::ok(
        one_segment_transcription("contract"),
        one_speaker_diarization(),
    ));

    let id = registry.submit(engine, vec![0u8; 8], ProcessOptions::default());
    let task = wait_terminal(&registry, id).await;

    let value = serde_json::to_value(&task).unwrap();
    assert_eq!(value["status"], "completed");
    assert_eq!(value["progress_percent"], 100);
    assert!(value["result"]["speakers"].is_array());
    // Internal bookkeeping never leaks into the API payload
    assert!(value.get("finished_at").is_none());
    // Errors are omitted entirely on success, not null
    assert!(value.get("error_message").is_none());
}

/// Remote transcription stubbed empty + the real energy diarizer: the
/// hybrid shape used when no voice-print model is deployed.
struct SilentMeetingEngine {
    diarizer: EnergyDiarizer,
}

#[async_trait]
impl SpeechEngine for SilentMeetingEngine {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _opts: &TranscribeOptions,
    ) -> meetscribe::Result<Transcription> {
        Ok(Transcription {
            text: String::new(),
            segments: vec![],
            language: "en".to_string(),
        })
    }

    async fn diarize(
        &self,
        audio: &[u8],
        _opts: &DiarizeOptions,
    ) -> meetscribe::Result<Diarization> {
        self.diarizer.diarize_wav(audio)
    }
}

#[tokio::test]
async fn test_ten_seconds_of_silence_completes_with_empty_result() {
    let registry = TaskRegistry::new(Duration::from_secs(600));
    let engine = Arc::new(SilentMeetingEngine {
        diarizer: EnergyDiarizer::default(),
    });

    let silence = wav::encode(&vec![0i16; 16_000 * 10], 16_000, 1).unwrap();
    let id = registry.submit(engine, silence, ProcessOptions::default());
    let task = wait_terminal(&registry, id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.unwrap();
    assert_eq!(result.text, "");
    assert!(result.segments.is_empty());
    assert!(result.speakers.is_empty());
}
