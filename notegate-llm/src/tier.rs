//! Model tier selection.
//!
//! ```text
//! Fast: chat, translate                               higher temperature
//! Deep: summarize, create_note, explain, improve      lower temperature
//! ```
//!
//! The operation → tier table is fixed in code. Only the model identifier and
//! generation parameters bound to each tier come from configuration.

use serde::{Deserialize, Serialize};

use crate::pool::Credential;
use crate::types::Operation;

/// Execution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Low latency, cheaper model.
    Fast,
    /// Slower model for structured reasoning.
    Deep,
}

impl Tier {
    /// Static operation → tier binding.
    #[must_use]
    pub fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::Chat | Operation::Translate => Self::Fast,
            Operation::Summarize
            | Operation::CreateNote
            | Operation::Explain
            | Operation::ImproveWriting => Self::Deep,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Deep => "deep",
        }
    }
}

/// Sampling parameters sent with every request on a tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Defaults for the fast tier: varied phrasing is acceptable.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }

    /// Defaults for the deep tier: favour consistency.
    #[must_use]
    pub fn deep() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 32,
            max_output_tokens: 8192,
        }
    }
}

/// A tier's upstream model and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TierBinding {
    pub model: String,
    pub params: GenerationParams,
}

/// The two tier bindings, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    fast: TierBinding,
    deep: TierBinding,
}

impl TierTable {
    #[must_use]
    pub fn new(fast: TierBinding, deep: TierBinding) -> Self {
        Self { fast, deep }
    }

    #[must_use]
    pub fn binding(&self, tier: Tier) -> &TierBinding {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Deep => &self.deep,
        }
    }

    /// Bind a credential to a tier, producing the handle passed to the upstream call.
    #[must_use]
    pub fn bind(&self, tier: Tier, credential_index: usize, credential: Credential) -> ModelHandle {
        let binding = self.binding(tier);
        let model = BoundModel {
            credential_index,
            credential,
            model: binding.model.clone(),
            params: binding.params,
        };
        match tier {
            Tier::Fast => ModelHandle::Fast(model),
            Tier::Deep => ModelHandle::Deep(model),
        }
    }
}

/// Credential + model + parameters for one attempt.
#[derive(Debug, Clone)]
pub struct BoundModel {
    /// Position of the credential in the pool.
    pub credential_index: usize,
    pub credential: Credential,
    pub model: String,
    pub params: GenerationParams,
}

/// A model bound to a credential, tagged with the tier it was bound for.
#[derive(Debug, Clone)]
pub enum ModelHandle {
    Fast(BoundModel),
    Deep(BoundModel),
}

impl ModelHandle {
    #[must_use]
    pub fn tier(&self) -> Tier {
        match self {
            Self::Fast(_) => Tier::Fast,
            Self::Deep(_) => Tier::Deep,
        }
    }

    #[must_use]
    pub fn bound(&self) -> &BoundModel {
        match self {
            Self::Fast(bound) | Self::Deep(bound) => bound,
        }
    }

    #[must_use]
    pub fn credential_index(&self) -> usize {
        self.bound().credential_index
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.bound().model
    }

    #[must_use]
    pub fn params(&self) -> &GenerationParams {
        &self.bound().params
    }
}
