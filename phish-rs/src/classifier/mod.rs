//! Email classification
//!
//! Normalization, feature extraction, vocabulary encoding and the scoring
//! model, plus the training loop that produces their persisted state.

mod artifacts;
mod features;
mod labels;
mod model;
mod normalize;
mod pipeline;
mod policy;
mod scaler;
mod training;
mod vocabulary;

pub use artifacts::Artifacts;
pub use features::{extract, FeatureVector, FEATURE_COUNT};
pub use labels::{Label, ProbabilityTriple};
pub use model::ScoringModel;
pub use normalize::normalize;
pub use pipeline::{Classification, Classifier, TextClassifier};
pub use policy::DecisionPolicy;
pub use scaler::Scaler;
pub use training::{stratified_split, EpochMetrics, Trainer, TrainingReport};
pub use vocabulary::{Vocabulary, PAD_ID};
