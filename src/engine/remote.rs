//! HTTP client for the remote model server.
//!
//! The server exposes `/api/transcribe` and `/api/diarize`, each taking a
//! multipart WAV upload plus query parameters. Engine failures come back as
//! non-2xx responses whose body is preserved verbatim for diagnostics.
//! No client-side timeout is set: a long recording legitimately takes
//! minutes, and a hung call stalls only the task that issued it.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{
    Diarization, DiarizeOptions, SpeakerTurn, SpeechEngine, TranscribeOptions, TranscribedSegment,
    Transcription, WordTiming,
};
use crate::error::{Result, ScribeError};

pub struct RemoteEngine {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteEngine {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn audio_part(audio: &[u8]) -> Result<reqwest::multipart::Part> {
        reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| ScribeError::Engine(format!("failed to build upload: {}", e)))
    }

    async fn read_error(response: reqwest::Response) -> ScribeError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ScribeError::Engine(format!("model server returned {}: {}", status, body))
    }
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<ResponseSegment>,
    #[serde(default)]
    language: String,
}

#[derive(Debug, Deserialize)]
struct ResponseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    words: Option<Vec<ResponseWord>>,
}

#[derive(Debug, Deserialize)]
struct ResponseWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default)]
    probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DiarizeResponse {
    #[serde(default)]
    segments: Vec<ResponseTurn>,
}

#[derive(Debug, Deserialize)]
struct ResponseTurn {
    start: f64,
    end: f64,
    speaker: String,
}

#[async_trait]
impl SpeechEngine for RemoteEngine {
    async fn transcribe(&self, audio: &[u8], opts: &TranscribeOptions) -> Result<Transcription> {
        let form = reqwest::multipart::Form::new().part("file", Self::audio_part(audio)?);

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(language) = &opts.language {
            query.push(("language", language.clone()));
        }
        if let Some(model) = &opts.model_hint {
            query.push(("model_size", model.clone()));
        }

        debug!(bytes = audio.len(), "sending audio for transcription");

        let response = self
            .client
            .post(format!("{}/api/transcribe", self.base_url))
            .query(&query)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScribeError::Engine(format!("transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::Engine(format!("invalid transcription response: {}", e)))?;

        Ok(Transcription {
            text: body.text,
            language: body.language,
            segments: body
                .segments
                .into_iter()
                .map(|s| TranscribedSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                    words: s.words.map(|words| {
                        words
                            .into_iter()
                            .map(|w| WordTiming {
                                word: w.word,
                                start: w.start,
                                end: w.end,
                                probability: w.probability,
                            })
                            .collect()
                    }),
                })
                .collect(),
        })
    }

    async fn diarize(&self, audio: &[u8], opts: &DiarizeOptions) -> Result<Diarization> {
        let form = reqwest::multipart::Form::new().part("file", Self::audio_part(audio)?);

        debug!(bytes = audio.len(), "sending audio for diarization");

        let response = self
            .client
            .post(format!("{}/api/diarize", self.base_url))
            .query(&[
                ("min_speakers", opts.min_speakers.to_string()),
                ("max_speakers", opts.max_speakers.to_string()),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScribeError::Engine(format!("diarization request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: DiarizeResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::Engine(format!("invalid diarization response: {}", e)))?;

        Ok(Diarization {
            turns: body
                .segments
                .into_iter()
                .map(|t| SpeakerTurn {
                    start: t.start,
                    end: t.end,
                    speaker: t.speaker,
                })
                .collect(),
        })
    }
}
