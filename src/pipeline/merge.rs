//! Joining transcription with diarization.
//!
//! Each transcribed segment is attributed to the diarization speaker with
//! the greatest total temporal overlap; an exact tie goes to the speaker
//! whose earliest overlapping range starts first. Segments no speaker
//! covers get a synthetic `unknown` speaker.

use serde::{Deserialize, Serialize};

use crate::engine::{Diarization, Transcription, WordTiming};

/// Fixed display palette, assigned round-robin by first-seen speaker order.
pub const SPEAKER_PALETTE: [&str; 8] = [
    "#8B5CF6", "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#EC4899", "#06B6D4", "#84CC16",
];

pub const UNKNOWN_SPEAKER_ID: &str = "unknown";
const UNKNOWN_SPEAKER_COLOR: &str = "#9CA3AF";

/// A transcript segment with its attributed speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Final pipeline output, immutable once attached to a completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub text: String,
    pub segments: Vec<ResultSegment>,
    pub speakers: Vec<Speaker>,
    pub language: String,
}

/// Deterministic interval-overlap join of the two engine outputs.
pub fn merge(transcription: Transcription, diarization: Diarization) -> ProcessingResult {
    // Speakers in first-seen order drive naming and palette assignment
    let mut speaker_order: Vec<String> = Vec::new();
    for turn in &diarization.turns {
        if !speaker_order.contains(&turn.speaker) {
            speaker_order.push(turn.speaker.clone());
        }
    }

    let mut used_unknown = false;
    let segments: Vec<ResultSegment> = transcription
        .segments
        .into_iter()
        .map(|seg| {
            let speaker_id = match assign_speaker(seg.start, seg.end, &diarization) {
                Some(speaker) => speaker,
                None => {
                    used_unknown = true;
                    UNKNOWN_SPEAKER_ID.to_string()
                }
            };
            ResultSegment {
                start: seg.start,
                end: seg.end,
                text: seg.text,
                speaker_id,
                words: seg.words,
            }
        })
        .collect();

    let mut speakers: Vec<Speaker> = speaker_order
        .iter()
        .enumerate()
        .map(|(i, id)| Speaker {
            id: id.clone(),
            name: format!("Speaker {}", i + 1),
            color: SPEAKER_PALETTE[i % SPEAKER_PALETTE.len()].to_string(),
        })
        .collect();
    if used_unknown {
        speakers.push(Speaker {
            id: UNKNOWN_SPEAKER_ID.to_string(),
            name: "Unknown".to_string(),
            color: UNKNOWN_SPEAKER_COLOR.to_string(),
        });
    }

    ProcessingResult {
        text: transcription.text,
        segments,
        speakers,
        language: transcription.language,
    }
}

/// Pick the speaker with the greatest summed overlap against `[start, end]`.
/// Ties resolve to the speaker whose earliest overlapping range starts
/// first. Returns `None` when nothing overlaps.
fn assign_speaker(start: f64, end: f64, diarization: &Diarization) -> Option<String> {
    struct Candidate {
        speaker: String,
        overlap: f64,
        earliest_start: f64,
    }

    let mut candidates: Vec<Candidate> = Vec::new();

    for turn in &diarization.turns {
        let overlap = (end.min(turn.end) - start.max(turn.start)).max(0.0);
        if overlap <= 0.0 {
            continue;
        }
        match candidates.iter_mut().find(|c| c.speaker == turn.speaker) {
            Some(c) => {
                c.overlap += overlap;
                if turn.start < c.earliest_start {
                    c.earliest_start = turn.start;
                }
            }
            None => candidates.push(Candidate {
                speaker: turn.speaker.clone(),
                overlap,
                earliest_start: turn.start,
            }),
        }
    }

    candidates
        .into_iter()
        .reduce(|best, c| {
            if c.overlap > best.overlap
                || (c.overlap == best.overlap && c.earliest_start < best.earliest_start)
            {
                c
            } else {
                best
            }
        })
        .map(|c| c.speaker)
}
