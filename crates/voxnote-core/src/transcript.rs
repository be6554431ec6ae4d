use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Output of one speech-to-text run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: String,
    pub duration_seconds: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("model not available: {0}")]
    ModelNotAvailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("audio decode failed: {0}")]
    AudioDecode(String),
    #[error("resample failed: {0}")]
    Resample(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Local speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<TranscriptionResult, TranscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let e = TranscriptionError::AudioDecode("no track".into());
        assert_eq!(e.to_string(), "audio decode failed: no track");
        let io: TranscriptionError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "vocab.txt").into();
        assert!(io.to_string().contains("vocab.txt"));
    }
}
