//! Message-cost estimation.
//!
//! The window manager only needs "how many tokens does this text cost", so the
//! tokenizer sits behind [`MessageCostEstimator`] and can be swapped per model.
//! The default is the BPE encoding OpenAI uses for the configured model.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer as BpeEncoding};
use tiktoken_rs::CoreBPE;
use tokenizers::Tokenizer;

use crate::core::errors::ApiError;

/// Which estimator backs the window when no `tokenizer.json` is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// BPE encoding matched to the completion model.
    #[default]
    Bpe,
    /// `ceil(bytes / 4)`, no vocabulary needed.
    Heuristic,
}

/// Estimates how many model tokens a piece of message content costs.
pub trait MessageCostEstimator: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    fn cost(&self, text: &str) -> usize;
}

/// ~4 bytes per token, the usual approximation for English text on GPT-style
/// vocabularies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHeuristicEstimator;

const BYTES_PER_TOKEN: usize = 4;

impl MessageCostEstimator for CharHeuristicEstimator {
    fn name(&self) -> &str {
        "char-heuristic"
    }

    fn cost(&self, text: &str) -> usize {
        text.len().div_ceil(BYTES_PER_TOKEN)
    }
}

/// Exact counts from a HuggingFace `tokenizer.json`.
pub struct TokenizerEstimator {
    tokenizer: Tokenizer,
    name: String,
}

impl TokenizerEstimator {
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|err| {
            ApiError::Internal(format!(
                "Failed to load tokenizer {}: {}",
                path.display(),
                err
            ))
        })?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("tokenizer")
            .to_string();
        Ok(Self { tokenizer, name })
    }
}

impl MessageCostEstimator for TokenizerEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(err) => {
                tracing::warn!("Tokenizer failed, falling back to heuristic: {}", err);
                CharHeuristicEstimator.cost(text)
            }
        }
    }
}

/// Token counts from tiktoken's BPE tables, the same encoding the completion
/// endpoint bills with.
pub struct BpeEstimator {
    bpe: CoreBPE,
    name: &'static str,
}

impl BpeEstimator {
    /// Encoding for `model`. Models tiktoken does not know (custom
    /// fine-tune prefixes, local servers) get `cl100k_base`, the GPT-4 encoding.
    pub fn for_model(model: &str) -> Result<Self, ApiError> {
        let encoding = get_tokenizer(model).unwrap_or_else(|| {
            tracing::info!(model, "No known encoding for model, using cl100k_base");
            BpeEncoding::Cl100kBase
        });
        Self::from_encoding(encoding)
    }

    pub fn from_encoding(encoding: BpeEncoding) -> Result<Self, ApiError> {
        let bpe = tiktoken_rs::get_bpe_from_tokenizer(encoding).map_err(|err| {
            ApiError::Internal(format!("Failed to load {:?} encoding: {}", encoding, err))
        })?;
        Ok(Self {
            bpe,
            name: encoding_name(encoding),
        })
    }
}

fn encoding_name(encoding: BpeEncoding) -> &'static str {
    match encoding {
        BpeEncoding::O200kBase => "o200k_base",
        BpeEncoding::Cl100kBase => "cl100k_base",
        BpeEncoding::P50kBase => "p50k_base",
        BpeEncoding::R50kBase => "r50k_base",
        BpeEncoding::P50kEdit => "p50k_edit",
        BpeEncoding::Gpt2 => "gpt2",
    }
}

impl MessageCostEstimator for BpeEstimator {
    fn name(&self) -> &str {
        self.name
    }

    fn cost(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// A `tokenizer.json` when one is configured, otherwise `kind` for `model`.
pub fn build_estimator(
    model: &str,
    kind: EstimatorKind,
    path: Option<&Path>,
) -> Result<Arc<dyn MessageCostEstimator>, ApiError> {
    let estimator: Arc<dyn MessageCostEstimator> = match (path, kind) {
        (Some(path), _) => Arc::new(TokenizerEstimator::from_file(path)?),
        (None, EstimatorKind::Bpe) => Arc::new(BpeEstimator::for_model(model)?),
        (None, EstimatorKind::Heuristic) => Arc::new(CharHeuristicEstimator),
    };
    tracing::info!(estimator = estimator.name(), "Token estimator ready");
    Ok(estimator)
}
