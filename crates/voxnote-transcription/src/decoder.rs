//! ONNX graph runs and the greedy token-and-duration decoding loop.
#![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;
use voxnote_core::transcript::TranscriptionError;

use crate::error::ResultExt;
use crate::model::Vocabulary;

/// Frames to advance for each duration class the joint network predicts.
pub const DURATIONS: [usize; 5] = [0, 1, 2, 3, 4];

/// Upper bound on tokens emitted without leaving a frame.
pub const MAX_SYMBOLS_PER_FRAME: usize = 10;

const LSTM_LAYERS: usize = 2;
const LSTM_DIM: usize = 640;

/// Decision for one joint-network step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub token: usize,
    pub advance: usize,
}

/// Split joint logits into a token choice and a frame advance.
pub fn pick_step(logits: &[f32], token_count: usize) -> Result<Step, TranscriptionError> {
    let needed = token_count + DURATIONS.len();
    if logits.len() < needed {
        return Err(TranscriptionError::Inference(format!(
            "joint output has {} logits, expected {needed}",
            logits.len()
        )));
    }
    Ok(Step {
        token: argmax(&logits[..token_count]),
        advance: DURATIONS[argmax(&logits[token_count..needed])],
    })
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map_or(0, |(i, _)| i)
}

/// Frame cursor for the greedy loop.
///
/// A frame is left when the model predicts a non-zero duration, when it emits
/// blank, or after [`MAX_SYMBOLS_PER_FRAME`] tokens on the same frame.
#[derive(Debug, Default)]
struct Cursor {
    frame: usize,
    emitted_here: usize,
}

impl Cursor {
    fn advance(&mut self, step: Step, blank: usize) {
        let emitted = step.token != blank;
        if emitted {
            self.emitted_here += 1;
        }
        if step.advance > 0 {
            self.frame += step.advance;
            self.emitted_here = 0;
        } else if !emitted || self.emitted_here >= MAX_SYMBOLS_PER_FRAME {
            self.frame += 1;
            self.emitted_here = 0;
        }
    }
}

/// Prediction-network LSTM state, committed only when a token is emitted.
struct DecoderState {
    h: Vec<f32>,
    c: Vec<f32>,
}

impl DecoderState {
    fn zeros() -> Self {
        Self {
            h: vec![0.0; LSTM_LAYERS * LSTM_DIM],
            c: vec![0.0; LSTM_LAYERS * LSTM_DIM],
        }
    }

    fn tensors(&self) -> Result<(Tensor<f32>, Tensor<f32>), TranscriptionError> {
        let shape = [LSTM_LAYERS as i64, 1, LSTM_DIM as i64];
        Ok((
            Tensor::from_array((shape, self.h.clone())).inference("state tensor")?,
            Tensor::from_array((shape, self.c.clone())).inference("state tensor")?,
        ))
    }
}

/// Greedy decode over `encodings` (`[frames, hidden]`), returning token ids.
pub fn greedy_decode(
    encodings: &Array2<f32>,
    valid_frames: usize,
    decoder_joint: &mut Session,
    vocab: &Vocabulary,
) -> Result<Vec<usize>, TranscriptionError> {
    let frames = valid_frames.min(encodings.nrows());
    let hidden = encodings.ncols();
    let blank = vocab.blank();
    let token_count = vocab.logit_count();

    let mut state = DecoderState::zeros();
    let mut cursor = Cursor::default();
    let mut tokens: Vec<usize> = Vec::new();

    while cursor.frame < frames {
        let frame: Vec<f32> = encodings.row(cursor.frame).to_vec();
        let encoder_input =
            Tensor::from_array(([1i64, hidden as i64, 1], frame)).inference("frame tensor")?;
        let prev = tokens.last().copied().unwrap_or(blank);
        let targets = Tensor::from_array(([1i64, 1], vec![prev as i32])).inference("targets")?;
        let target_length =
            Tensor::from_array(([1i64], vec![1i32])).inference("target_length")?;
        let (h, c) = state.tensors()?;

        let outputs = decoder_joint
            .run(ort::inputs![
                "encoder_outputs" => encoder_input,
                "targets" => targets,
                "target_length" => target_length,
                "input_states_1" => h,
                "input_states_2" => c,
            ])
            .inference("decoder_joint run")?;

        let (_, logits) = outputs["outputs"]
            .try_extract_tensor::<f32>()
            .inference("joint logits")?;
        let step = pick_step(logits, token_count)?;

        if step.token != blank {
            let (_, h) = outputs["output_states_1"]
                .try_extract_tensor::<f32>()
                .inference("state 1")?;
            let (_, c) = outputs["output_states_2"]
                .try_extract_tensor::<f32>()
                .inference("state 2")?;
            state.h = h.to_vec();
            state.c = c.to_vec();
            tokens.push(step.token);
        }
        cursor.advance(step, blank);
    }

    debug!(frames, tokens = tokens.len(), "greedy decode finished");
    Ok(tokens)
}

/// Mel features for a 16 kHz waveform: `([1, mels, T], valid_len)`.
pub fn run_preprocessor(
    preprocessor: &mut Session,
    samples: &[f32],
) -> Result<(Array3<f32>, i64), TranscriptionError> {
    let n = samples.len() as i64;
    let waveforms =
        Tensor::from_array(([1i64, n], samples.to_vec())).inference("waveform tensor")?;
    let lens = Tensor::from_array(([1i64], vec![n])).inference("waveform length")?;

    let outputs = preprocessor
        .run(ort::inputs![
            "waveforms" => waveforms,
            "waveforms_lens" => lens,
        ])
        .inference("preprocessor run")?;

    let (shape, data) = outputs["features"]
        .try_extract_tensor::<f32>()
        .inference("features")?;
    let (_, lens) = outputs["features_lens"]
        .try_extract_tensor::<i64>()
        .inference("features_lens")?;

    let dims = (shape[0] as usize, shape[1] as usize, shape[2] as usize);
    let features = Array3::from_shape_vec(dims, data.to_vec()).inference("reshape features")?;
    Ok((features, lens.first().copied().unwrap_or(0)))
}

/// Encoder pass. The graph emits `[1, hidden, T']`; the result is transposed
/// to one row per frame.
pub fn run_encoder(
    encoder: &mut Session,
    features: &Array3<f32>,
    features_len: i64,
) -> Result<(Array2<f32>, usize), TranscriptionError> {
    let dims = features.shape();
    let signal = Tensor::from_array((
        [dims[0] as i64, dims[1] as i64, dims[2] as i64],
        features.iter().copied().collect::<Vec<f32>>(),
    ))
    .inference("audio_signal tensor")?;
    let length = Tensor::from_array(([1i64], vec![features_len])).inference("length tensor")?;

    let outputs = encoder
        .run(ort::inputs![
            "audio_signal" => signal,
            "length" => length,
        ])
        .inference("encoder run")?;

    let (shape, data) = outputs["outputs"]
        .try_extract_tensor::<f32>()
        .inference("encoder output")?;
    let (_, lens) = outputs["encoded_lengths"]
        .try_extract_tensor::<i64>()
        .inference("encoded_lengths")?;

    let (hidden, frames) = (shape[1] as usize, shape[2] as usize);
    let by_channel = Array2::from_shape_vec((hidden, frames), data.to_vec())
        .inference("reshape encoder output")?;
    let valid = lens.first().map_or(frames, |&l| l.max(0) as usize);
    Ok((by_channel.t().to_owned(), valid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 2.0, -1.0]), 1);
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), 1);
        assert_eq!(argmax(&[7.0]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn step_splits_token_and_duration_logits() {
        // three tokens, then five duration classes
        let logits = [0.0, 5.0, 1.0, 0.0, 0.0, 0.0, 9.0, 0.0];
        let step = pick_step(&logits, 3).unwrap();
        assert_eq!(step, Step { token: 1, advance: 3 });
    }

    #[test]
    fn step_rejects_short_logits() {
        assert!(matches!(
            pick_step(&[0.0; 6], 3),
            Err(TranscriptionError::Inference(_))
        ));
    }

    #[test]
    fn blank_moves_to_next_frame() {
        let mut c = Cursor::default();
        c.advance(Step { token: 9, advance: 0 }, 9);
        assert_eq!(c.frame, 1);
    }

    #[test]
    fn token_with_zero_duration_stays_on_frame() {
        let mut c = Cursor::default();
        c.advance(Step { token: 2, advance: 0 }, 9);
        assert_eq!(c.frame, 0);
        c.advance(Step { token: 3, advance: 2 }, 9);
        assert_eq!(c.frame, 2);
        assert_eq!(c.emitted_here, 0);
    }

    #[test]
    fn symbol_cap_forces_progress() {
        let mut c = Cursor::default();
        for _ in 0..MAX_SYMBOLS_PER_FRAME {
            c.advance(Step { token: 1, advance: 0 }, 9);
        }
        assert_eq!(c.frame, 1);
    }
}
