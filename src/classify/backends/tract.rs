#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::backend::{GestureClassifier, RunningMode};
use crate::classify::result::{GestureCandidate, HandSide, Recognition};

/// Tract-based gesture classifier for ONNX models.
///
/// Expects a model with a `1x3xHxW` float input (RGB, 0..1) and a single score vector
/// output with one entry per label. Scores are softmaxed when they do not already sum
/// to one. The model reports no hand side and no landmarks.
pub struct TractClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    width: u32,
    height: u32,
    mode: RunningMode,
    /// Candidates below this score are dropped before ranking.
    min_score: f32,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        labels: Vec<String>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("gesture model needs at least one label"));
        }
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            labels,
            width,
            height,
            mode: RunningMode::Image,
            min_score: 0.05,
        })
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Nearest-neighbour resample of an RGB frame into the model's NCHW input.
    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if expected_len == 0 || pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected_len,
                width,
                height,
                pixels.len()
            ));
        }

        let (src_w, src_h) = (width as usize, height as usize);
        let (dst_w, dst_h) = (self.width as usize, self.height as usize);
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, dst_h, dst_w), |(_, channel, y, x)| {
            let sx = x * src_w / dst_w;
            let sy = y * src_h / dst_h;
            pixels[(sy * src_w + sx) * 3 + channel] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn rank(&self, outputs: TVec<TValue>) -> Result<Vec<GestureCandidate>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();
        if scores.len() != self.labels.len() {
            return Err(anyhow!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            ));
        }

        let scores = normalize(scores);
        let mut candidates: Vec<GestureCandidate> = self
            .labels
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score >= self.min_score)
            .map(|(label, score)| GestureCandidate::new(label.clone(), score, HandSide::Unknown))
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(candidates)
    }
}

fn normalize(scores: Vec<f32>) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let already_probabilities =
        scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    if already_probabilities {
        return scores;
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl GestureClassifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn set_running_mode(&mut self, mode: RunningMode) -> Result<()> {
        self.mode = mode;
        Ok(())
    }

    fn classify(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        _timestamp_ms: u64,
    ) -> Result<Recognition> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Ok(Recognition {
            gestures: self.rank(outputs)?,
            landmarks: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_softmaxes_logits() {
        let probs = normalize(vec![2.0, 1.0, 0.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn normalize_keeps_probabilities() {
        assert_eq!(normalize(vec![0.25, 0.75]), vec![0.25, 0.75]);
    }
}
