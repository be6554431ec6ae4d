//! Transcript summarization: text cleanup, the Hugging Face inference client
//! and the retry loop that wraps it.

pub mod huggingface;
pub mod mock;
pub mod preprocess;
pub mod reliable;

pub use huggingface::{HuggingFaceBackend, DEFAULT_API_URL};
pub use preprocess::{clean, CleanedText, FILLER_WORDS, MAX_WORDS};
pub use reliable::{ResilientSummarizer, RetryPolicy};
