//! Local speech-to-text on the parakeet-tdt-0.6b-v3 ONNX export.
//!
//! ```text
//! upload bytes → symphonia decode → mono mix → rubato resample (16 kHz)
//! → nemo128.onnx          mel features  [1, 128, T]
//! → encoder-model.onnx    encodings     [1, 1024, T']
//! → decoder_joint-model   greedy TDT loop over encoder frames
//! → vocab.txt             token ids → text
//! ```
//!
//! The inference stack sits behind the `onnx` feature. Without it the crate
//! only offers model path helpers and a transcriber that always reports the
//! model as unavailable.

pub mod error;
pub mod model;

#[cfg(feature = "onnx")]
pub mod audio;
#[cfg(feature = "onnx")]
pub mod decoder;
#[cfg(feature = "onnx")]
pub mod engine;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use voxnote_core::transcript::{Transcriber, TranscriptionError, TranscriptionResult};

#[cfg(feature = "onnx")]
pub use engine::OnnxTranscriber;
pub use model::{default_model_dir, is_model_cached, ModelPaths};

/// Stand-in used when the crate is built without an inference backend.
pub struct UnavailableTranscriber {
    reason: String,
}

impl UnavailableTranscriber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transcriber for UnavailableTranscriber {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _mime_type: &str,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        Err(TranscriptionError::ModelNotAvailable(self.reason.clone()))
    }
}

/// Fetch the model if allowed and missing, then load it.
pub async fn load_transcriber(
    model_dir: &Path,
    auto_download: bool,
) -> Result<Arc<dyn Transcriber>, TranscriptionError> {
    #[cfg(feature = "onnx")]
    {
        if auto_download {
            model::ensure_model(model_dir).await?;
        } else if !is_model_cached(model_dir) {
            return Err(TranscriptionError::ModelNotAvailable(format!(
                "model files missing in {} and auto download is off",
                model_dir.display()
            )));
        }
        let engine = OnnxTranscriber::load(model_dir.to_path_buf()).await?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = auto_download;
        tracing::warn!(dir = %model_dir.display(), "built without the onnx feature, transcription disabled");
        Ok(Arc::new(UnavailableTranscriber::new(
            "built without the onnx feature",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_transcriber_reports_reason() {
        let t = UnavailableTranscriber::new("no model");
        let err = t.transcribe(b"RIFF", "audio/wav").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::ModelNotAvailable(ref m) if m == "no model"));
    }

    #[cfg(feature = "onnx")]
    #[tokio::test]
    async fn load_without_download_fails_on_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let result = load_transcriber(tmp.path(), false).await;
        assert!(matches!(result, Err(TranscriptionError::ModelNotAvailable(_))));
    }
}
