//! Operation surface: the six entry points the product calls.
//!
//! Each operation renders its template, composes the system instruction,
//! picks its tier, and runs exactly one upstream call per attempt through
//! the [`Orchestrator`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::{GeminiClient, Provider};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::failover::Orchestrator;
use crate::pool::CredentialPool;
use crate::prompt::PromptSet;
use crate::types::{
    Attachment, GenerateRequest, Operation, OperationRequest, UserPreferences, WritingStyle,
};

/// Summary length used when the caller gives none.
pub const DEFAULT_SUMMARY_WORDS: u32 = 300;

/// Generative-text gateway over a pool of provider credentials.
///
/// Cheap to clone; clones share the pool health state.
#[derive(Clone)]
pub struct Gateway {
    orchestrator: Orchestrator,
    provider: Arc<dyn Provider>,
    prompts: Arc<PromptSet>,
}

impl Gateway {
    /// Gateway over the Gemini HTTP API, built from validated configuration.
    ///
    /// # Errors
    /// Returns `GatewayError::Config` if configuration is unusable, or
    /// `GatewayError::Prompt` if the prompt override directory fails to load.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let client = GeminiClient::new(
            config.upstream.base_url.clone(),
            Duration::from_millis(config.upstream.request_timeout_ms),
        );
        Self::with_provider(config, Arc::new(client))
    }

    /// Gateway over an arbitrary provider.
    ///
    /// # Errors
    /// Same as [`Gateway::from_config`].
    pub fn with_provider(config: &GatewayConfig, provider: Arc<dyn Provider>) -> Result<Self> {
        config.validate()?;
        let pool = CredentialPool::from_secrets(config.api_keys())?;
        let prompts = match &config.prompts.directory {
            Some(dir) if !dir.as_os_str().is_empty() => PromptSet::from_directory(dir)?,
            _ => PromptSet::builtin(),
        };
        info!(
            credentials = pool.size(),
            fast_model = %config.models.fast,
            deep_model = %config.models.deep,
            "gateway initialized"
        );
        let orchestrator = Orchestrator::with_timing(
            pool,
            config.tier_table(),
            config.failover.reset_window(),
            config.failover.cooldown(),
        );
        Ok(Self::new(orchestrator, provider, prompts))
    }

    /// Assemble from parts.
    #[must_use]
    pub fn new(orchestrator: Orchestrator, provider: Arc<dyn Provider>, prompts: PromptSet) -> Self {
        Self {
            orchestrator,
            provider,
            prompts: Arc::new(prompts),
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Conversational reply, optionally grounded in note context and files.
    ///
    /// # Errors
    /// `InvalidRequest` for an empty message, otherwise see [`Orchestrator::execute`].
    pub async fn chat(
        &self,
        message: &str,
        context: Option<&str>,
        attachments: &[Attachment],
        prefs: Option<&UserPreferences>,
    ) -> Result<String> {
        require_text(message)?;
        let context = context.map(str::trim).filter(|c| !c.is_empty());
        let tpl = self.prompts.get(Operation::Chat);
        let vars = [("context", context.unwrap_or_default()), ("message", message)];
        let request = GenerateRequest::text(tpl.system(&vars, prefs), tpl.user(&vars, context.is_some()))
            .with_attachments(attachments);
        self.run(Operation::Chat, request).await
    }

    /// Sectioned summary of about `max_length` words (default 300).
    ///
    /// # Errors
    /// `InvalidRequest` for empty text or a zero length.
    pub async fn summarize(
        &self,
        text: &str,
        max_length: Option<u32>,
        prefs: Option<&UserPreferences>,
    ) -> Result<String> {
        require_text(text)?;
        let max_length = max_length.unwrap_or(DEFAULT_SUMMARY_WORDS);
        if max_length == 0 {
            return Err(GatewayError::InvalidRequest("max_length must be positive".into()));
        }
        let max_length = max_length.to_string();
        self.render_and_run(Operation::Summarize, &[("max_length", max_length.as_str()), ("text", text)], prefs)
            .await
    }

    /// Hierarchical note: goal, sections, insights, action items.
    ///
    /// # Errors
    /// `InvalidRequest` for empty text.
    pub async fn create_note(&self, text: &str, prefs: Option<&UserPreferences>) -> Result<String> {
        require_text(text)?;
        self.render_and_run(Operation::CreateNote, &[("text", text)], prefs)
            .await
    }

    /// Four-part explanation: definition, analogy, mechanism, significance.
    ///
    /// # Errors
    /// `InvalidRequest` for empty text.
    pub async fn explain(&self, text: &str, prefs: Option<&UserPreferences>) -> Result<String> {
        require_text(text)?;
        self.render_and_run(Operation::Explain, &[("text", text)], prefs)
            .await
    }

    /// Full rewrite in `style`, no commentary.
    ///
    /// # Errors
    /// `InvalidRequest` for empty text.
    pub async fn improve_writing(
        &self,
        text: &str,
        style: WritingStyle,
        prefs: Option<&UserPreferences>,
    ) -> Result<String> {
        require_text(text)?;
        self.render_and_run(
            Operation::ImproveWriting,
            &[("style", style.description()), ("text", text)],
            prefs,
        )
        .await
    }

    /// Translation into `target_language`, formatting preserved.
    ///
    /// # Errors
    /// `InvalidRequest` for empty text or a blank language.
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        prefs: Option<&UserPreferences>,
    ) -> Result<String> {
        require_text(text)?;
        let language = target_language.trim();
        if language.is_empty() {
            return Err(GatewayError::InvalidRequest("target language is required".into()));
        }
        self.render_and_run(Operation::Translate, &[("language", language), ("text", text)], prefs)
            .await
    }

    /// Route a generic request to its operation.
    ///
    /// # Errors
    /// Whatever the routed operation returns; `InvalidRequest` if a translate
    /// request carries no target language.
    pub async fn dispatch(&self, request: &OperationRequest) -> Result<String> {
        let prefs = request.preferences.as_ref();
        let text = request.text.as_str();
        match request.operation {
            Operation::Chat => {
                self.chat(text, request.context.as_deref(), &request.attachments, prefs)
                    .await
            }
            Operation::Summarize => self.summarize(text, request.max_length, prefs).await,
            Operation::CreateNote => self.create_note(text, prefs).await,
            Operation::Explain => self.explain(text, prefs).await,
            Operation::ImproveWriting => {
                self.improve_writing(text, request.style.unwrap_or_default(), prefs)
                    .await
            }
            Operation::Translate => {
                let language = request.target_language.as_deref().ok_or_else(|| {
                    GatewayError::InvalidRequest("target language is required".into())
                })?;
                self.translate(text, language, prefs).await
            }
        }
    }

    async fn render_and_run(
        &self,
        operation: Operation,
        vars: &[(&str, &str)],
        prefs: Option<&UserPreferences>,
    ) -> Result<String> {
        let tpl = self.prompts.get(operation);
        let request = GenerateRequest::text(tpl.system(vars, prefs), tpl.user(vars, false));
        self.run(operation, request).await
    }

    async fn run(&self, operation: Operation, request: GenerateRequest) -> Result<String> {
        let provider = self.provider.as_ref();
        let request = &request;
        let text = self
            .orchestrator
            .execute(operation.label(), operation.tier(), move |handle| async move {
                provider.generate(&handle, request).await
            })
            .await?;

        if text.trim().is_empty() {
            debug!(%operation, "upstream returned empty text, using fallback");
            return Ok(self.prompts.get(operation).fallback.clone());
        }
        Ok(text)
    }
}

fn require_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        Err(GatewayError::InvalidRequest("text must not be empty".into()))
    } else {
        Ok(())
    }
}
