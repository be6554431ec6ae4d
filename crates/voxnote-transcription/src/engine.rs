use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use tracing::{debug, info, instrument};
use voxnote_core::transcript::{Transcriber, TranscriptionError, TranscriptionResult};

use crate::audio;
use crate::decoder;
use crate::error::ResultExt;
use crate::model::{ModelPaths, Vocabulary};

const ENCODER_THREADS: usize = 4;
const DECODER_THREADS: usize = 1;

/// Reported for every transcript; the model does not expose language id.
const LANGUAGE: &str = "en";

struct Sessions {
    preprocessor: Mutex<Session>,
    encoder: Mutex<Session>,
    decoder_joint: Mutex<Session>,
    vocab: Vocabulary,
}

fn open_session(path: &Path, threads: usize, what: &str) -> Result<Session, TranscriptionError> {
    let session = Session::builder()
        .model("session builder")?
        .with_intra_threads(threads)
        .model("intra threads")?
        .commit_from_file(path)
        .model(what)?;
    debug!(model = what, "session loaded");
    Ok(session)
}

impl Sessions {
    fn load(model_dir: &Path) -> Result<Self, TranscriptionError> {
        let paths = ModelPaths::from_dir(model_dir);
        let missing = paths.missing();
        if !missing.is_empty() {
            return Err(TranscriptionError::ModelNotAvailable(format!(
                "missing {} in {}",
                missing.join(", "),
                model_dir.display()
            )));
        }

        Ok(Self {
            preprocessor: Mutex::new(open_session(&paths.preprocessor, ENCODER_THREADS, "preprocessor")?),
            encoder: Mutex::new(open_session(&paths.encoder, ENCODER_THREADS, "encoder")?),
            decoder_joint: Mutex::new(open_session(&paths.decoder_joint, DECODER_THREADS, "decoder_joint")?),
            vocab: Vocabulary::load(&paths.vocab)?,
        })
    }

    /// Waveform to text. CPU bound; call from a blocking thread.
    fn infer(&self, samples: &[f32]) -> Result<String, TranscriptionError> {
        let (features, features_len) = {
            let mut session = self.preprocessor.lock().inference("preprocessor lock")?;
            decoder::run_preprocessor(&mut session, samples)?
        };
        let (encodings, frames) = {
            let mut session = self.encoder.lock().inference("encoder lock")?;
            decoder::run_encoder(&mut session, &features, features_len)?
        };
        let tokens = {
            let mut session = self.decoder_joint.lock().inference("decoder lock")?;
            decoder::greedy_decode(&encodings, frames, &mut session, &self.vocab)?
        };
        Ok(self.vocab.detokenize(&tokens))
    }
}

/// Parakeet TDT engine. Sessions are loaded once and shared; cloning is cheap.
#[derive(Clone)]
pub struct OnnxTranscriber {
    sessions: Arc<Sessions>,
}

impl OnnxTranscriber {
    /// Load all sessions from `model_dir` on a blocking thread.
    pub async fn load(model_dir: PathBuf) -> Result<Self, TranscriptionError> {
        info!(dir = %model_dir.display(), "loading speech model");
        let sessions = tokio::task::spawn_blocking(move || Sessions::load(&model_dir))
            .await
            .model("load task")??;
        info!(
            vocab = sessions.vocab.logit_count(),
            blank = sessions.vocab.blank(),
            "speech model ready"
        );
        Ok(Self {
            sessions: Arc::new(sessions),
        })
    }
}

#[async_trait]
impl Transcriber for OnnxTranscriber {
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let data = audio.to_vec();
        let mime = mime_type.to_string();
        let waveform = tokio::task::spawn_blocking(move || audio::decode(data, &mime))
            .await
            .audio_decode("decode task")??;
        let duration_seconds = waveform.duration_seconds();
        debug!(duration_seconds, samples = waveform.samples.len(), "audio ready");

        let sessions = Arc::clone(&self.sessions);
        let text = tokio::task::spawn_blocking(move || sessions.infer(&waveform.samples))
            .await
            .inference("inference task")??;

        info!(duration_seconds, chars = text.len(), "transcription complete");
        Ok(TranscriptionResult {
            text,
            language: LANGUAGE.into(),
            duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_reports_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let err = match OnnxTranscriber::load(tmp.path().to_path_buf()).await {
            Err(e) => e,
            Ok(_) => panic!("expected load to fail"),
        };
        match err {
            TranscriptionError::ModelNotAvailable(msg) => {
                assert!(msg.contains("encoder-model.onnx"), "got {msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore = "downloads the model"]
    async fn transcribes_silence_to_short_text() {
        let dir = crate::model::default_model_dir();
        crate::model::ensure_model(&dir).await.unwrap();
        let engine = OnnxTranscriber::load(dir).await.unwrap();

        let mut wav = Vec::new();
        let frames: u32 = 16_000;
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + frames * 2).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&16_000u32.to_le_bytes());
        wav.extend_from_slice(&32_000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(frames * 2).to_le_bytes());
        wav.resize(wav.len() + (frames * 2) as usize, 0);

        let result = engine.transcribe(&wav, "audio/wav").await.unwrap();
        assert!((result.duration_seconds - 1.0).abs() < 1e-6);
        assert_eq!(result.language, "en");
    }
}
