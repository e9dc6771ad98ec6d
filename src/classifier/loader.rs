//! Locating checkpoint files and preparing the tokenizer and compute device.

use crate::{
    Error, Result,
    config::{DeviceKind, ModelConfig},
};
use candle_core::Device;
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokenizers::{
    PaddingParams, PaddingStrategy, Tokenizer, TruncationParams,
    models::wordpiece::WordPiece, normalizers::BertNormalizer,
    pre_tokenizers::bert::BertPreTokenizer, processors::bert::BertProcessing,
};
use tracing::{debug, info};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const TOKENIZER_FILE: &str = "tokenizer.json";
const VOCAB_FILE: &str = "vocab.txt";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// The part of `tokenizer_config.json` a vocab-only checkpoint needs.
#[derive(Debug, Deserialize)]
struct VocabTokenizerConfig {
    #[serde(default = "default_lowercase")]
    do_lower_case: bool,
}

fn default_lowercase() -> bool {
    true
}

/// Older checkpoints ship only a WordPiece vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerSource {
    Json(PathBuf),
    Vocab(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config_path: PathBuf,
    pub tokenizer: TokenizerSource,
    pub weights_path: PathBuf,
}

pub fn resolve_model_files(config: &ModelConfig) -> Result<ModelFiles> {
    match &config.path {
        Some(dir) => local_model_files(Path::new(dir)),
        None => download_model_files(&config.id, &config.revision),
    }
}

pub fn local_model_files(dir: &Path) -> Result<ModelFiles> {
    if !dir.is_dir() {
        return Err(Error::model_load(format!(
            "Model directory not found: {}",
            dir.display()
        )));
    }
    debug!("Using local model files from {}", dir.display());

    let config_path = require_file(dir, CONFIG_FILE)?;
    let weights_path = require_file(dir, WEIGHTS_FILE)?;

    let tokenizer_path = dir.join(TOKENIZER_FILE);
    let vocab_path = dir.join(VOCAB_FILE);
    let tokenizer = if tokenizer_path.is_file() {
        TokenizerSource::Json(tokenizer_path)
    } else if vocab_path.is_file() {
        TokenizerSource::Vocab(vocab_path)
    } else {
        return Err(Error::model_load(format!(
            "No tokenizer found in {} (tried {}, {})",
            dir.display(),
            TOKENIZER_FILE,
            VOCAB_FILE
        )));
    };

    Ok(ModelFiles {
        config_path,
        tokenizer,
        weights_path,
    })
}

/// Downloads into the HuggingFace cache (`~/.cache/huggingface/hub/`).
fn download_model_files(repo_id: &str, revision: &str) -> Result<ModelFiles> {
    info!("Fetching '{}' at revision '{}' from the hub", repo_id, revision);

    let api = Api::new()?;
    let repo = api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo.get(CONFIG_FILE)?;
    let tokenizer = match repo.get(TOKENIZER_FILE) {
        Ok(path) => TokenizerSource::Json(path),
        Err(e) => {
            debug!("{} unavailable ({}), falling back to {}", TOKENIZER_FILE, e, VOCAB_FILE);
            // Lands next to vocab.txt in the snapshot when the repo has one
            if let Err(e) = repo.get(TOKENIZER_CONFIG_FILE) {
                debug!("{} unavailable ({})", TOKENIZER_CONFIG_FILE, e);
            }
            TokenizerSource::Vocab(repo.get(VOCAB_FILE)?)
        }
    };
    let weights_path = repo.get(WEIGHTS_FILE)?;

    Ok(ModelFiles {
        config_path,
        tokenizer,
        weights_path,
    })
}

fn require_file(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::model_load(format!(
            "Missing {} in {}",
            name,
            dir.display()
        )))
    }
}

/// Loads the tokenizer with truncation at `max_length` and batch-longest padding.
pub fn load_tokenizer(source: &TokenizerSource, max_length: usize, pad_id: u32) -> Result<Tokenizer> {
    let mut tokenizer = match source {
        TokenizerSource::Json(path) => Tokenizer::from_file(path)?,
        TokenizerSource::Vocab(path) => wordpiece_tokenizer(path)?,
    };

    let pad_token = tokenizer
        .id_to_token(pad_id)
        .unwrap_or_else(|| "[PAD]".to_string());

    tokenizer
        .with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            pad_id,
            pad_token,
            ..Default::default()
        }))
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))?;

    Ok(tokenizer)
}

fn wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer> {
    debug!("Building WordPiece tokenizer from {}", vocab_path.display());

    let wordpiece = WordPiece::from_file(&vocab_path.to_string_lossy())
        .unk_token("[UNK]".to_string())
        .build()?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    let cls_id = special_token_id(&tokenizer, "[CLS]")?;
    let sep_id = special_token_id(&tokenizer, "[SEP]")?;
    let lowercase = vocab_lowercase(vocab_path)?;

    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(
        ("[SEP]".to_string(), sep_id),
        ("[CLS]".to_string(), cls_id),
    )));

    Ok(tokenizer)
}

/// Reads `do_lower_case` from a sibling `tokenizer_config.json`; uncased when absent.
fn vocab_lowercase(vocab_path: &Path) -> Result<bool> {
    let config_path = vocab_path.with_file_name(TOKENIZER_CONFIG_FILE);
    if !config_path.is_file() {
        return Ok(true);
    }
    let config_str = std::fs::read_to_string(&config_path)?;
    let config: VocabTokenizerConfig = serde_json::from_str(&config_str)?;
    debug!("do_lower_case={} from {}", config.do_lower_case, config_path.display());
    Ok(config.do_lower_case)
}

fn special_token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| Error::tokenizer(format!("Vocabulary has no {} token", token)))
}

pub fn select_device(kind: DeviceKind) -> Result<Device> {
    let device = match kind {
        DeviceKind::Cpu => Device::Cpu,
        DeviceKind::Cuda => Device::new_cuda(0)?,
        DeviceKind::Metal => Device::new_metal(0)?,
        DeviceKind::Auto => {
            if candle_core::utils::cuda_is_available() {
                Device::new_cuda(0)?
            } else if candle_core::utils::metal_is_available() {
                Device::new_metal(0)?
            } else {
                Device::Cpu
            }
        }
    };
    info!("Using {:?} for inference", device);
    Ok(device)
}
