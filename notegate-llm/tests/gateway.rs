//! Operation surface tests against a scripted provider.

mod common;

use std::sync::Arc;

use notegate_llm::prompt::{ACCURACY_CONTRACT, FORMATTING_CONTRACT};
use notegate_llm::types::Part;
use notegate_llm::{
    Attachment, ExpertiseLevel, GatewayConfig, GatewayError, Gateway, GenerationParams, Operation,
    OperationRequest, Tier, Tone, UserPreferences, WritingStyle,
};

use common::{Call, DEEP_MODEL, FAST_MODEL, ScriptedProvider, bad_request};

fn config(keys: usize) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.credentials.api_keys = (0..keys).map(|i| format!("key-{i}")).collect();
    config.models.fast = FAST_MODEL.into();
    config.models.deep = DEEP_MODEL.into();
    config
}

fn gateway(provider: &Arc<ScriptedProvider>) -> Gateway {
    Gateway::with_provider(&config(2), provider.clone()).expect("valid config")
}

fn only_call(provider: &ScriptedProvider) -> Call {
    let mut calls = provider.calls();
    assert_eq!(calls.len(), 1, "expected exactly one upstream call");
    calls.remove(0)
}

fn user_text(call: &Call) -> &str {
    match call.request.parts.first() {
        Some(Part::Text(text)) => text,
        other => panic!("first part must be text, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tier routing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn every_operation_uses_its_tier() {
    for op in Operation::all() {
        let provider = Arc::new(ScriptedProvider::new());
        let gw = gateway(&provider);
        let mut request = OperationRequest::new(*op, "Photosynthesis converts light into energy.");
        request.target_language = Some("Spanish".into());
        gw.dispatch(&request).await.expect("operation succeeds");

        let call = only_call(&provider);
        let (tier, model, params) = match op {
            Operation::Chat | Operation::Translate => (Tier::Fast, FAST_MODEL, GenerationParams::fast()),
            _ => (Tier::Deep, DEEP_MODEL, GenerationParams::deep()),
        };
        assert_eq!(call.tier, tier, "{op}");
        assert_eq!(call.model, model, "{op}");
        assert_eq!(call.params, params, "{op}");
    }
}

#[tokio::test(start_paused = true)]
async fn configured_models_reach_the_provider() {
    let provider = Arc::new(ScriptedProvider::new());
    let mut cfg = config(1);
    cfg.models.deep = "custom-deep".into();
    cfg.tiers.deep.temperature = 0.1;
    let gw = Gateway::with_provider(&cfg, provider.clone()).expect("valid");

    gw.explain("entropy", None).await.expect("ok");
    let call = only_call(&provider);
    assert_eq!(call.model, "custom-deep");
    assert!((call.params.temperature - 0.1).abs() < f32::EPSILON);
}

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn system_instruction_carries_contracts_and_preferences() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);
    let prefs = UserPreferences {
        tone: Some(Tone::Casual),
        expertise: Some(ExpertiseLevel::Expert),
        ..UserPreferences::default()
    };

    gw.create_note("meeting notes", Some(&prefs)).await.expect("ok");
    let system = only_call(&provider).request.system_instruction;
    assert!(system.starts_with("You are "));
    assert!(system.contains(FORMATTING_CONTRACT));
    assert!(system.contains(ACCURACY_CONTRACT));
    assert!(system.contains("conversational tone"));
    assert!(system.contains("expert"));
    assert!(!system.contains("Write the answer in"));
}

#[tokio::test(start_paused = true)]
async fn dispatched_preferences_reach_the_system_instruction() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);
    let request = OperationRequest::new(Operation::Explain, "recursion").with_preferences(UserPreferences {
        language: Some("Italian".into()),
        ..UserPreferences::default()
    });

    gw.dispatch(&request).await.expect("ok");
    let system = only_call(&provider).request.system_instruction;
    assert!(system.ends_with("- Write the answer in Italian."));
}

#[tokio::test(start_paused = true)]
async fn chat_without_context_sends_the_bare_message() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);

    gw.chat("What is Rust?", Some("   "), &[], None).await.expect("ok");
    let call = only_call(&provider);
    assert_eq!(user_text(&call), "What is Rust?");
}

#[tokio::test(start_paused = true)]
async fn chat_with_context_wraps_message() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);

    gw.chat("Who wrote it?", Some("Note: {message} by Ana"), &[], None)
        .await
        .expect("ok");
    let call = only_call(&provider);
    let text = user_text(&call);
    assert!(text.contains("Note: {message} by Ana"), "braces in context kept verbatim");
    assert!(text.ends_with("Who wrote it?"));
}

#[tokio::test(start_paused = true)]
async fn chat_attachments_follow_the_text() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);
    let image = Attachment::new("image/png", vec![0x89, b'P', b'N', b'G']).with_file_name("diagram.png");

    gw.chat("Describe this", None, std::slice::from_ref(&image), None)
        .await
        .expect("ok");
    let call = only_call(&provider);
    assert_eq!(call.request.parts.len(), 2);
    assert_eq!(call.request.parts[1], Part::Inline(image));
}

#[tokio::test(start_paused = true)]
async fn summarize_defaults_to_three_hundred_words() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);

    gw.summarize("long text", None, None).await.expect("ok");
    assert!(user_text(&only_call(&provider)).contains("about 300 words"));

    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);
    gw.summarize("long text", Some(50), None).await.expect("ok");
    assert!(user_text(&only_call(&provider)).contains("about 50 words"));
}

#[tokio::test(start_paused = true)]
async fn improve_writing_names_the_style() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);

    gw.improve_writing("i think its good", WritingStyle::Academic, None)
        .await
        .expect("ok");
    let call = only_call(&provider);
    let style = WritingStyle::Academic.description();
    assert!(user_text(&call).contains(style));
    assert!(call.request.system_instruction.contains(style));
}

#[tokio::test(start_paused = true)]
async fn translate_names_the_target_language() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);

    gw.translate("Good morning", " Japanese ", None).await.expect("ok");
    assert!(user_text(&only_call(&provider)).contains("into Japanese."));
}

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn empty_upstream_text_becomes_fallback() {
    let provider = Arc::new(ScriptedProvider::with_script(vec![Ok("  \n".into())]));
    let gw = gateway(&provider);

    let out = gw.explain("gravity", None).await.expect("ok");
    assert_eq!(out, "The text could not be explained.");
}

#[tokio::test(start_paused = true)]
async fn upstream_text_is_returned_verbatim() {
    let provider = Arc::new(ScriptedProvider::with_script(vec![Ok("## Overview\n\nDone.".into())]));
    let gw = gateway(&provider);

    let out = gw.summarize("text", None, None).await.expect("ok");
    assert_eq!(out, "## Overview\n\nDone.");
}

#[tokio::test(start_paused = true)]
async fn fatal_upstream_error_reaches_caller() {
    let provider = Arc::new(ScriptedProvider::with_script(vec![Err(bad_request())]));
    let gw = gateway(&provider);

    let err = gw.create_note("text", None).await.expect_err("fatal");
    assert!(matches!(err, GatewayError::Upstream(_)));
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_never_reach_upstream() {
    let provider = Arc::new(ScriptedProvider::new());
    let gw = gateway(&provider);

    let cases = [
        gw.chat("  ", None, &[], None).await,
        gw.summarize("text", Some(0), None).await,
        gw.explain("", None).await,
        gw.translate("hola", "  ", None).await,
        gw.dispatch(&OperationRequest::new(Operation::Translate, "hola")).await,
    ];
    for result in cases {
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clones_share_pool_health() {
    let provider = Arc::new(ScriptedProvider::with_exhausted(&[0]));
    let gw = gateway(&provider);
    let other = gw.clone();

    gw.chat("hi", None, &[], None).await.expect("rotates to 1");
    other.chat("hi again", None, &[], None).await.expect("starts at 1");
    assert_eq!(provider.credentials_used(), vec![0, 1, 1]);
    assert_eq!(other.orchestrator().unhealthy(), vec![0]);
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn missing_credentials_fail_construction() {
    let provider = Arc::new(ScriptedProvider::new());
    let err = Gateway::with_provider(&config(0), provider).err().expect("no keys");
    assert!(matches!(err, GatewayError::Config(_)));
}

#[test]
fn duplicate_credentials_collapse() {
    let provider = Arc::new(ScriptedProvider::new());
    let mut cfg = config(0);
    cfg.credentials.api_keys = vec!["same".into(), " same ".into(), String::new()];
    let gw = Gateway::with_provider(&cfg, provider).expect("one key");
    assert_eq!(gw.orchestrator().pool_size(), 1);
}

#[test]
fn missing_prompt_directory_fails_construction() {
    let provider = Arc::new(ScriptedProvider::new());
    let mut cfg = config(1);
    cfg.prompts.directory = Some("/nonexistent/notegate/prompts".into());
    let err = Gateway::with_provider(&cfg, provider).err().expect("missing dir");
    assert!(matches!(err, GatewayError::Prompt(_)));
}

#[test]
fn empty_prompt_directory_means_builtin() {
    let provider = Arc::new(ScriptedProvider::new());
    let cfg = GatewayConfig::from_toml("[prompts]\ndirectory = \"\"\n")
        .expect("toml")
        .with_env_from(|key: &str| (key == "GEMINI_API_KEY").then(|| "k".to_string()));
    assert!(Gateway::with_provider(&cfg, provider).is_ok());
}
