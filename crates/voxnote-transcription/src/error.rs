use voxnote_core::transcript::TranscriptionError;

/// Attach a stage label to foreign errors while converting them.
pub trait ResultExt<T> {
    fn inference(self, context: &str) -> Result<T, TranscriptionError>;
    fn audio_decode(self, context: &str) -> Result<T, TranscriptionError>;
    fn resample(self, context: &str) -> Result<T, TranscriptionError>;
    fn model(self, context: &str) -> Result<T, TranscriptionError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn inference(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::Inference(format!("{context}: {e}")))
    }

    fn audio_decode(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::AudioDecode(format!("{context}: {e}")))
    }

    fn resample(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::Resample(format!("{context}: {e}")))
    }

    fn model(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::ModelNotAvailable(format!("{context}: {e}")))
    }
}
