mod distilbert;
pub mod loader;

pub use distilbert::SentimentClassifier;
pub use loader::{ModelFiles, TokenizerSource, resolve_model_files, select_device};

use crate::{Error, Result, config::ModelConfig};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// A loaded sequence-classification model that maps text to a label.
///
/// Implementations are read-only after construction and are shared across
/// requests behind an `Arc`.
pub trait SentimentModel: Send + Sync {
    /// Classifies every text in one padded batch, returning one label per input.
    fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>>;

    fn labels(&self) -> &LabelMap;

    fn classify(&self, text: &str) -> Result<String> {
        self.classify_batch(&[text])?
            .pop()
            .ok_or_else(|| Error::inference("No prediction returned"))
    }
}

const DEFAULT_NUM_LABELS: usize = 2;

/// Index-to-label mapping read from the checkpoint's `id2label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::model_load("Label mapping is empty"));
        }
        Ok(Self { labels })
    }

    /// Builds the mapping from `{"0": "NEGATIVE", "1": "POSITIVE"}`.
    ///
    /// Keys must cover `0..n` exactly.
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Result<Self> {
        let mut entries = Vec::with_capacity(id2label.len());
        for (key, label) in id2label {
            let index: usize = key.parse().map_err(|_| {
                Error::model_load(format!("Invalid label index in id2label: '{}'", key))
            })?;
            entries.push((index, label.clone()));
        }
        entries.sort_by_key(|(index, _)| *index);

        for (expected, (index, _)) in entries.iter().enumerate() {
            if *index != expected {
                return Err(Error::model_load(format!(
                    "id2label is missing index {}",
                    expected
                )));
            }
        }

        Self::new(entries.into_iter().map(|(_, label)| label).collect())
    }

    /// Labels for a checkpoint config: `id2label` when present, otherwise
    /// `LABEL_0..LABEL_{n-1}` with `n` from `num_labels` (2 when unset).
    pub fn from_checkpoint(
        id2label: &HashMap<String, String>,
        num_labels: Option<usize>,
    ) -> Result<Self> {
        if !id2label.is_empty() {
            return Self::from_id2label(id2label);
        }
        let count = num_labels.unwrap_or(DEFAULT_NUM_LABELS);
        Self::new((0..count).map(|i| format!("LABEL_{}", i)).collect())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Index of the largest score. Ties go to the lowest index and NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Resolves, downloads if needed, and loads the configured checkpoint.
///
/// Blocking: call from `spawn_blocking` inside the runtime.
pub fn load(config: &ModelConfig) -> Result<Arc<dyn SentimentModel>> {
    let files = resolve_model_files(config)?;
    let device = select_device(config.device)?;
    let classifier = SentimentClassifier::new(&files, device, config.max_length)?;

    info!(
        "Loaded model '{}' with labels: {:?}",
        config.path.as_deref().unwrap_or(&config.id),
        classifier.labels().iter().collect::<Vec<_>>()
    );

    Ok(Arc::new(classifier))
}
