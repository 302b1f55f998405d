//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use notegate_llm::client::Provider;
use notegate_llm::pool::CredentialPool;
use notegate_llm::tier::{GenerationParams, ModelHandle, Tier, TierBinding, TierTable};
use notegate_llm::types::GenerateRequest;
use notegate_llm::UpstreamError;

pub const FAST_MODEL: &str = "test-flash";
pub const DEEP_MODEL: &str = "test-pro";

pub fn tiers() -> TierTable {
    TierTable::new(
        TierBinding {
            model: FAST_MODEL.into(),
            params: GenerationParams::fast(),
        },
        TierBinding {
            model: DEEP_MODEL.into(),
            params: GenerationParams::deep(),
        },
    )
}

pub fn pool(size: usize) -> CredentialPool {
    CredentialPool::from_secrets((0..size).map(|i| format!("key-{i}"))).expect("non-empty pool")
}

pub fn quota() -> UpstreamError {
    UpstreamError::Http {
        status: 429,
        code: Some("RESOURCE_EXHAUSTED".into()),
        message: "Resource has been exhausted (e.g. check quota).".into(),
    }
}

pub fn bad_request() -> UpstreamError {
    UpstreamError::Http {
        status: 400,
        code: Some("INVALID_ARGUMENT".into()),
        message: "Request contains an invalid argument.".into(),
    }
}

/// One recorded upstream call.
#[derive(Debug, Clone)]
pub struct Call {
    pub credential: usize,
    pub tier: Tier,
    pub model: String,
    pub params: GenerationParams,
    pub request: GenerateRequest,
}

/// Provider whose answers are scripted in order; once the script runs out,
/// credentials listed in `exhausted` answer with quota errors and every other
/// credential answers `reply from <index>`.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, UpstreamError>>>,
    exhausted: Mutex<BTreeSet<usize>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Result<String, UpstreamError>>) -> Self {
        let provider = Self::default();
        *provider.script.lock() = script.into();
        provider
    }

    pub fn with_exhausted(indices: &[usize]) -> Self {
        let provider = Self::default();
        provider.exhausted.lock().extend(indices.iter().copied());
        provider
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn credentials_used(&self) -> Vec<usize> {
        self.calls.lock().iter().map(|c| c.credential).collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate(
        &self,
        model: &ModelHandle,
        request: &GenerateRequest,
    ) -> Result<String, UpstreamError> {
        let credential = model.credential_index();
        self.calls.lock().push(Call {
            credential,
            tier: model.tier(),
            model: model.model().to_string(),
            params: *model.params(),
            request: request.clone(),
        });

        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        if self.exhausted.lock().contains(&credential) {
            return Err(quota());
        }
        Ok(format!("reply from {credential}"))
    }
}
