//! # notegate-llm: generative-text request gateway
//!
//! Turns one logical "ask the AI to do X" call into a reliable request against
//! a pool of rate-limited credentials for the same provider:
//!   - **Tier selection**: chat and translate run on the fast model; summarize,
//!     create-note, explain and improve-writing run on the deep model
//!   - **Instruction composition**: role, formatting contract, accuracy
//!     contract, then per-user tuning
//!   - **Failover**: quota errors rotate to the next healthy credential;
//!     every other error is returned immediately
//!   - **Self-healing**: exhausted credentials are retried after a reset window
//!
//! # Architecture
//!
//! ```text
//! Gateway::summarize(..)
//!   ├─ PromptSet / compose()      system instruction + user content
//!   ├─ Tier::for_operation()      fast | deep
//!   └─ Orchestrator::execute()    CredentialPool + RotationState (one mutex)
//!        └─ Provider::generate()  one HTTP call per attempt
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod failover;
pub mod gateway;
pub mod pool;
pub mod prompt;
pub mod tier;
pub mod types;

pub use client::{GeminiClient, Provider};
pub use config::GatewayConfig;
pub use error::{GatewayError, UpstreamError};
pub use failover::{Attempt, FailoverStats, Orchestrator, RotationState, SharedRotation};
pub use gateway::Gateway;
pub use pool::{Credential, CredentialPool, HealthTracker};
pub use tier::{GenerationParams, ModelHandle, Tier, TierTable};
pub use types::{
    Attachment, ExpertiseLevel, Operation, OperationRequest, ResponseLength, Tone,
    UserPreferences, WritingStyle,
};
