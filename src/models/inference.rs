//! ONNX Runtime backed classifier

use crate::feature_aligner::FeatureVector;
use crate::models::classifier::Classifier;
use crate::models::loader::{LoadedModel, ModelBundle, ModelLoader};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Gradient-boosted classifier exported to ONNX.
pub struct OnnxClassifier {
    /// Session runs need exclusive access
    model: Mutex<LoadedModel>,
    name: String,
    feature_count: usize,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel, feature_count: usize) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
            feature_count,
        }
    }

    /// Load the bundle's model with the given intra-op thread count.
    pub fn from_bundle(bundle: &ModelBundle, onnx_threads: usize) -> Result<Self> {
        let loader = ModelLoader::with_threads(onnx_threads)?;
        let model = loader.load_model(&bundle.model_path, &bundle.name)?;
        Ok(Self::new(model, bundle.feature_names.len()))
    }

    /// Run the session on one feature row
    fn run(&self, features: &[f32]) -> Result<f64> {
        use ort::value::Tensor;

        let mut model = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let model_name = model.name.clone();
        let output_name = model.output_name.clone();
        let input_name = model.input_name.clone();

        let outputs = model
            .session
            .run(ort::inputs![input_name.as_str() => input_tensor])?;

        extract_probability(&outputs, &output_name, &model_name)
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.feature_count {
            anyhow::bail!(
                "Model {} expects {} features, got {}",
                self.name,
                self.feature_count,
                features.len()
            );
        }

        let probability = self.run(&features.to_f32())?;
        debug!(model = %self.name, probability = probability, "Inference complete");
        Ok(probability.clamp(0.0, 1.0))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Extract the fraud probability from model output.
/// Handles tensor outputs and the seq(map) outputs LightGBM and CatBoost exports produce.
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = probability_from_value(&output, model_name) {
            return Ok(prob);
        }
    }

    // Fallback: try every non-label output
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(prob) = probability_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, "Probability taken from fallback output");
            return Ok(prob);
        }
    }

    warn!(model = %model_name, "Model output carried no fraud probability");
    anyhow::bail!("Model {} produced no probability output", model_name)
}

fn probability_from_value(output: &ort::value::DynValue, model_name: &str) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let prob = fraud_prob_from_tensor(shape, data);
        debug!(model = %model_name, prob = prob, "Extracted from tensor");
        return Some(prob);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        match fraud_prob_from_sequence_map(output) {
            Ok(prob) => {
                debug!(model = %model_name, prob = prob, "Extracted from seq(map)");
                return Some(prob);
            }
            Err(e) => debug!(model = %model_name, error = %e, "seq(map) extraction failed"),
        }
    }

    None
}

/// Probability of class 1 from a seq(map(int64, float)) value
fn fraud_prob_from_sequence_map(output: &ort::value::DynValue) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let first = maps
        .first()
        .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

    // batch_size is 1, so only the first map matters
    let kv_pairs = first.try_extract_key_values::<i64, f32>()?;

    if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *prob as f64);
    }

    Err(anyhow::anyhow!("No class probability found in map"))
}

/// Fraud class probability from a `[batch, classes]` or `[classes]` tensor
fn fraud_prob_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> f64 {
    let classes = shape.iter().last().copied().unwrap_or(0);
    match (classes, data) {
        (c, [_, fraud, ..]) if c >= 2 => *fraud as f64,
        (1, [only, ..]) => *only as f64,
        _ => data.last().map(|&v| v as f64).unwrap_or(0.0),
    }
}
