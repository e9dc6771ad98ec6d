use super::{LabelMap, ModelFiles, SentimentModel, argmax, loader::load_tokenizer};
use crate::{Error, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use serde::Deserialize;
use std::collections::HashMap;
use tokenizers::Tokenizer;
use tracing::debug;

/// Fields of `config.json` that the encoder config keeps private or ignores.
#[derive(Debug, Deserialize)]
struct CheckpointConfig {
    dim: usize,
    max_position_embeddings: usize,
    #[serde(default)]
    pad_token_id: u32,
    #[serde(default)]
    id2label: HashMap<String, String>,
    #[serde(default)]
    num_labels: Option<usize>,
}

/// DistilBERT encoder with the sequence-classification head
/// (`pre_classifier` + ReLU + `classifier` over the `[CLS]` state).
pub struct SentimentClassifier {
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    labels: LabelMap,
    device: Device,
}

impl SentimentClassifier {
    pub fn new(files: &ModelFiles, device: Device, max_length: Option<usize>) -> Result<Self> {
        let config_str = std::fs::read_to_string(&files.config_path)?;
        let checkpoint: CheckpointConfig = serde_json::from_str(&config_str)?;
        let encoder_config: DistilBertConfig = serde_json::from_str(&config_str)?;

        let labels = LabelMap::from_checkpoint(&checkpoint.id2label, checkpoint.num_labels)?;
        let max_length = max_length
            .map(|len| len.min(checkpoint.max_position_embeddings))
            .unwrap_or(checkpoint.max_position_embeddings);
        let tokenizer = load_tokenizer(&files.tokenizer, max_length, checkpoint.pad_token_id)?;

        // SAFETY: the weights file is memory-mapped and must not change while loaded.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights_path], DType::F32, &device)?
        };
        let model = DistilBertModel::load(vb.pp("distilbert"), &encoder_config)
            .map_err(|e| Error::model_load(format!("Failed to load DistilBERT encoder: {}", e)))?;
        let pre_classifier =
            candle_nn::linear(checkpoint.dim, checkpoint.dim, vb.pp("pre_classifier"))?;
        let classifier = candle_nn::linear(checkpoint.dim, labels.len(), vb.pp("classifier"))?;

        debug!(
            "DistilBERT classifier ready: dim={}, max_length={}, labels={}",
            checkpoint.dim,
            max_length,
            labels.len()
        );

        Ok(Self {
            model,
            pre_classifier,
            classifier,
            tokenizer,
            labels,
            device,
        })
    }

    /// Raw per-class scores, one row per input text.
    pub fn logits(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self.tokenizer.encode_batch(texts.to_vec(), true)?;
        let batch_size = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let input_ids: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_ids().to_vec())
            .collect();
        // The encoder masks positions set to 1, the inverse of the tokenizer's mask.
        let padding_mask: Vec<u8> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().map(|&m| u8::from(m == 0)))
            .collect();

        let input_ids = Tensor::from_vec(input_ids, (batch_size, seq_len), &self.device)?;
        let padding_mask =
            Tensor::from_vec(padding_mask, (batch_size, 1, 1, seq_len), &self.device)?;

        // [batch, seq_len, dim]
        let hidden_states = self.model.forward(&input_ids, &padding_mask)?;
        let cls = hidden_states.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        let logits = self.classifier.forward(&pooled)?;

        Ok(logits.to_dtype(DType::F32)?.to_vec2::<f32>()?)
    }
}

impl SentimentModel for SentimentClassifier {
    fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>> {
        self.logits(texts)?
            .iter()
            .map(|scores| {
                let index = argmax(scores)
                    .ok_or_else(|| Error::inference("Model produced no usable scores"))?;
                self.labels
                    .get(index)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::inference(format!("Label index {} out of range", index))
                    })
            })
            .collect()
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}
