//! Classifier, explainer and model loading

pub mod classifier;
pub mod explainer;
pub mod inference;
pub mod loader;

pub use classifier::{Classifier, Label};
pub use explainer::{Contribution, Explainer, OcclusionExplainer};
pub use inference::OnnxClassifier;
pub use loader::{ModelBundle, ModelLoader};
