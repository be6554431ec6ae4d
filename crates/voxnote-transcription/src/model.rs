//! Model file layout, vocabulary loading and first-run download.

use std::path::{Path, PathBuf};

use tracing::debug;
#[cfg(feature = "onnx")]
use tracing::info;
use voxnote_core::transcript::TranscriptionError;

use crate::error::ResultExt;

/// Hugging Face repository holding the ONNX export.
pub const HF_REPO: &str = "istupakov/parakeet-tdt-0.6b-v3-onnx";

/// Token the decoder emits when a frame produces no output.
pub const BLANK_TOKEN: &str = "<blk>";

/// Resolved locations of every file the engine needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub preprocessor: PathBuf,
    pub encoder: PathBuf,
    /// External weights referenced by the encoder graph.
    pub encoder_data: PathBuf,
    pub decoder_joint: PathBuf,
    pub vocab: PathBuf,
}

impl ModelPaths {
    pub const FILE_NAMES: [&'static str; 5] = [
        "nemo128.onnx",
        "encoder-model.onnx",
        "encoder-model.onnx.data",
        "decoder_joint-model.onnx",
        "vocab.txt",
    ];

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            preprocessor: dir.join(Self::FILE_NAMES[0]),
            encoder: dir.join(Self::FILE_NAMES[1]),
            encoder_data: dir.join(Self::FILE_NAMES[2]),
            decoder_joint: dir.join(Self::FILE_NAMES[3]),
            vocab: dir.join(Self::FILE_NAMES[4]),
        }
    }

    fn all(&self) -> [&Path; 5] {
        [
            &self.preprocessor,
            &self.encoder,
            &self.encoder_data,
            &self.decoder_joint,
            &self.vocab,
        ]
    }

    /// File names not present on disk.
    pub fn missing(&self) -> Vec<&'static str> {
        self.all()
            .iter()
            .zip(Self::FILE_NAMES)
            .filter(|(path, _)| !path.exists())
            .map(|(_, name)| name)
            .collect()
    }

    pub fn all_exist(&self) -> bool {
        self.missing().is_empty()
    }
}

/// `~/.voxnote/models/parakeet`, or under the temp dir when HOME is unset.
pub fn default_model_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".voxnote")
        .join("models")
        .join("parakeet")
}

pub fn is_model_cached(model_dir: impl AsRef<Path>) -> bool {
    ModelPaths::from_dir(model_dir).all_exist()
}

/// Token table from `vocab.txt`.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    tokens: Vec<String>,
    blank: usize,
}

impl Vocabulary {
    /// Parse `token id` lines. Lines without an id take their line index.
    pub fn parse(content: &str) -> Result<Self, TranscriptionError> {
        let mut entries: Vec<(usize, String)> = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let (token, id) = match line.rsplit_once(' ') {
                Some((token, id)) => match id.parse::<usize>() {
                    Ok(id) => (token, id),
                    Err(_) => (line, line_no),
                },
                None => (line, line_no),
            };
            entries.push((id, token.to_string()));
        }
        if entries.is_empty() {
            return Err(TranscriptionError::ModelNotAvailable(
                "vocabulary is empty".into(),
            ));
        }

        let size = entries.iter().map(|(id, _)| id + 1).max().unwrap_or(0);
        let mut tokens = vec![String::new(); size];
        for (id, token) in entries {
            tokens[id] = token;
        }
        let blank = tokens
            .iter()
            .position(|t| t == BLANK_TOKEN)
            .unwrap_or(tokens.len());

        Ok(Self { tokens, blank })
    }

    pub fn load(path: &Path) -> Result<Self, TranscriptionError> {
        let content = std::fs::read_to_string(path).model("read vocab.txt")?;
        let vocab = Self::parse(&content)?;
        debug!(size = vocab.tokens.len(), blank = vocab.blank, "loaded vocabulary");
        Ok(vocab)
    }

    pub fn blank(&self) -> usize {
        self.blank
    }

    /// Width of the token section of the joint network's logits.
    pub fn logit_count(&self) -> usize {
        self.tokens.len().max(self.blank + 1)
    }

    /// Concatenate token pieces, turning the word-start marker into spaces.
    pub fn detokenize(&self, ids: &[usize]) -> String {
        ids.iter()
            .filter(|&&id| id != self.blank)
            .filter_map(|&id| self.tokens.get(id))
            .map(String::as_str)
            .collect::<String>()
            .replace('\u{2581}', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Download any missing model files into `model_dir`.
#[cfg(feature = "onnx")]
pub async fn ensure_model(model_dir: impl AsRef<Path>) -> Result<(), TranscriptionError> {
    let model_dir = model_dir.as_ref().to_path_buf();
    let paths = ModelPaths::from_dir(&model_dir);
    if paths.all_exist() {
        debug!(dir = %model_dir.display(), "model files present");
        return Ok(());
    }

    info!(repo = HF_REPO, missing = ?paths.missing(), "downloading speech model");
    tokio::fs::create_dir_all(&model_dir).await?;

    // hf-hub's sync client does blocking IO
    tokio::task::spawn_blocking(move || download_missing(&model_dir))
        .await
        .model("download task")?
}

#[cfg(feature = "onnx")]
fn download_missing(model_dir: &Path) -> Result<(), TranscriptionError> {
    let api = hf_hub::api::sync::Api::new().model("hf-hub init")?;
    let repo = api.model(HF_REPO.to_string());

    for name in ModelPaths::from_dir(model_dir).missing() {
        info!(file = name, "fetching model file");
        let cached = repo.get(name).model(&format!("download {name}"))?;

        // Stage next to the target so a crash never leaves a truncated file
        // under the final name.
        let target = model_dir.join(name);
        let staging = model_dir.join(format!("{name}.part"));
        std::fs::copy(&cached, &staging).model(&format!("copy {name}"))?;
        std::fs::rename(&staging, &target).model(&format!("install {name}"))?;
        debug!(file = name, "model file ready");
    }

    info!(dir = %model_dir.display(), "speech model ready");
    Ok(())
}
