//! Optional local inference endpoint client for the intent classifier's external-model path.

pub mod http_classifier;

pub use http_classifier::HttpInferenceClassifier;
