//! Model bundle and ONNX session loading

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk manifest shipped next to the exported model.
///
/// ```json
/// { "name": "lightgbm", "model": "lightgbm.onnx", "feature_names": ["step", "amount", ...] }
/// ```
#[derive(Debug, Clone, Deserialize)]
struct BundleManifest {
    #[serde(default = "default_model_name")]
    name: String,
    model: PathBuf,
    feature_names: Vec<String>,
}

fn default_model_name() -> String {
    "lightgbm".to_string()
}

/// The fitted classifier's location together with its ordered feature names
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub name: String,
    /// ONNX file, resolved against the manifest directory
    pub model_path: PathBuf,
    /// Feature order the model was fit on
    pub feature_names: Vec<String>,
}

impl ModelBundle {
    /// Read and validate a bundle manifest.
    pub fn load<P: AsRef<Path>>(manifest_path: P) -> Result<Self> {
        let manifest_path = manifest_path.as_ref();
        let raw = std::fs::read_to_string(manifest_path)
            .with_context(|| format!("Failed to read model bundle {}", manifest_path.display()))?;
        let manifest: BundleManifest = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model bundle {}", manifest_path.display()))?;

        if manifest.feature_names.is_empty() {
            anyhow::bail!(
                "Model bundle {} lists no feature names",
                manifest_path.display()
            );
        }
        let mut seen = HashSet::new();
        if let Some(dup) = manifest.feature_names.iter().find(|n| !seen.insert(n.as_str())) {
            anyhow::bail!(
                "Model bundle {} lists feature `{}` twice",
                manifest_path.display(),
                dup
            );
        }

        let model_path = if manifest.model.is_absolute() {
            manifest.model
        } else {
            manifest_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(manifest.model)
        };

        info!(
            model = %manifest.name,
            path = %model_path.display(),
            features = manifest.feature_names.len(),
            "Model bundle loaded"
        );

        Ok(Self {
            name: manifest.name,
            model_path,
            feature_names: manifest.feature_names,
        })
    }
}

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());

        // Converters name the probability output `probabilities`; the label
        // output comes first, so prefer a match and otherwise take the last one.
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }
}
