pub mod errors;
pub mod ids;
pub mod security;
pub mod summary;
pub mod text;
pub mod transcript;

pub use errors::{AttemptOutcome, SummaryError};
pub use ids::RecordingId;
pub use security::ApiToken;
pub use summary::{SummaryBackend, SummaryParameters, SummaryRequest, Summarizer};
pub use transcript::{Transcriber, TranscriptionError, TranscriptionResult};
