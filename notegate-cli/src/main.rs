//! notegate CLI - run gateway operations from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Ask a question grounded in a note
//! notegate chat --context notes/sprint.md "What is left for this sprint?"
//!
//! # Summarize stdin in about 120 words, in French
//! cat article.md | notegate --language French summarize --max-length 120
//!
//! # Rewrite in an academic style
//! notegate improve --style academic "this study shows stuff works"
//!
//! # Translate
//! notegate translate --to Japanese "Good morning"
//! ```
//!
//! Credentials come from `GEMINI_API_KEY`, `GEMINI_API_KEY_1`, ... (a `.env`
//! file in the working directory is loaded first).

mod input;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use notegate_llm::{
    ExpertiseLevel, Gateway, GatewayConfig, GatewayError, Operation, OperationRequest,
    ResponseLength, Tone, UserPreferences, WritingStyle,
};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "notegate.toml";

// ============================================================================
// CLI Definition
// ============================================================================

/// Generative-text gateway for notes.
#[derive(Parser)]
#[command(name = "notegate")]
#[command(about = "Chat, summarize, explain, rewrite and translate text through a Gemini credential pool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML).
    #[arg(long, short, env = "NOTEGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output: debug logs and full error chains.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Tone of the answer: formal, casual, friendly, professional.
    #[arg(long, global = true)]
    tone: Option<Tone>,

    /// Answer length: short, medium, detailed.
    #[arg(long, global = true)]
    length: Option<ResponseLength>,

    /// Language to answer in.
    #[arg(long, global = true)]
    language: Option<String>,

    /// Reader expertise: beginner, intermediate, expert.
    #[arg(long, global = true)]
    expertise: Option<ExpertiseLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Conversational answer, optionally grounded in a note.
    Chat {
        /// Message; read from stdin when absent or `-`.
        text: Option<String>,
        /// File whose contents are passed as note context.
        #[arg(long)]
        context: Option<PathBuf>,
        /// File to send inline (repeatable).
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// Sectioned summary.
    Summarize {
        text: Option<String>,
        /// Target length in words.
        #[arg(long)]
        max_length: Option<u32>,
    },

    /// Turn raw text into a structured note.
    Note { text: Option<String> },

    /// Explain a passage or concept.
    Explain { text: Option<String> },

    /// Rewrite text in a given style.
    Improve {
        text: Option<String>,
        /// formal, casual, academic, professional.
        #[arg(long, default_value = "professional")]
        style: WritingStyle,
    },

    /// Translate text, keeping its formatting.
    Translate {
        text: Option<String>,
        /// Target language.
        #[arg(long = "to")]
        to: String,
    },
}

impl Cli {
    fn preferences(&self) -> Option<UserPreferences> {
        let prefs = UserPreferences {
            tone: self.tone,
            response_length: self.length,
            language: self.language.clone(),
            expertise: self.expertise,
        };
        (!prefs.is_empty()).then_some(prefs)
    }
}

impl Commands {
    fn into_request(self) -> Result<OperationRequest> {
        let request = match self {
            Self::Chat {
                text,
                context,
                attachments,
            } => {
                let mut request = OperationRequest::new(Operation::Chat, input::read_text(text)?);
                request.context = context.as_deref().map(input::load_context).transpose()?;
                request.attachments = attachments
                    .iter()
                    .map(|path| input::load_attachment(path))
                    .collect::<Result<_>>()?;
                request
            }
            Self::Summarize { text, max_length } => {
                let mut request = OperationRequest::new(Operation::Summarize, input::read_text(text)?);
                request.max_length = max_length;
                request
            }
            Self::Note { text } => OperationRequest::new(Operation::CreateNote, input::read_text(text)?),
            Self::Explain { text } => OperationRequest::new(Operation::Explain, input::read_text(text)?),
            Self::Improve { text, style } => {
                let mut request =
                    OperationRequest::new(Operation::ImproveWriting, input::read_text(text)?);
                request.style = Some(style);
                request
            }
            Self::Translate { text, to } => {
                let mut request = OperationRequest::new(Operation::Translate, input::read_text(text)?);
                request.target_language = Some(to);
                request
            }
        };
        Ok(request)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("notegate=debug,notegate_llm=debug,warn")
        } else {
            EnvFilter::new(format!("notegate={level},notegate_llm={level},warn"))
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    let config = match path {
        Some(path) => GatewayConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            GatewayConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => GatewayConfig::default(),
    };
    Ok(config.with_env())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let verbose = cli.verbose;

    match run(cli).await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err, verbose);
            ExitCode::from(exit_status(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_deref())?;
    setup_logging(&config.general.log_level, cli.verbose);

    let gateway = Gateway::from_config(&config)?;
    let preferences = cli.preferences();
    let mut request = cli.command.into_request()?;
    if let Some(preferences) = preferences {
        request = request.with_preferences(preferences);
    }

    debug!(operation = %request.operation, "dispatching");
    let result = gateway.dispatch(&request).await;
    debug!(stats = ?gateway.orchestrator().stats(), "failover stats");
    Ok(result?)
}

fn report(err: &anyhow::Error, verbose: bool) {
    match err.downcast_ref::<GatewayError>() {
        Some(GatewayError::Config(_) | GatewayError::Prompt(_) | GatewayError::InvalidRequest(_))
        | None => eprintln!("Error: {err}"),
        Some(gateway_err) => eprintln!("Error: {}", gateway_err.user_message()),
    }
    if verbose {
        eprintln!("Caused by: {err:#}");
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<GatewayError>() {
        Some(GatewayError::Overloaded { .. }) => 2,
        Some(GatewayError::InvalidRequest(_)) => 3,
        _ => 1,
    }
}
