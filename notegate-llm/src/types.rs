//! Core types for gateway requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tier::Tier;

/// The six operations the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Conversational reply, optionally grounded in note context.
    Chat,
    /// Sectioned summary of a text.
    Summarize,
    /// Restructure a text as a hierarchical note.
    CreateNote,
    /// Four-part pedagogical explanation.
    Explain,
    /// Rewrite a text in a target style.
    ImproveWriting,
    /// Translate a text into a target language.
    Translate,
}

impl Operation {
    /// All operations, in declaration order.
    #[must_use]
    pub fn all() -> &'static [Operation] {
        &[
            Self::Chat,
            Self::Summarize,
            Self::CreateNote,
            Self::Explain,
            Self::ImproveWriting,
            Self::Translate,
        ]
    }

    /// Stable snake_case label used in logs and template filenames.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Summarize => "summarize",
            Self::CreateNote => "create_note",
            Self::Explain => "explain",
            Self::ImproveWriting => "improve_writing",
            Self::Translate => "translate",
        }
    }

    /// The execution tier this operation always runs on.
    #[must_use]
    pub fn tier(self) -> Tier {
        Tier::for_operation(self)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|op| op.label() == s)
            .ok_or_else(|| format!("unknown operation: '{s}'"))
    }
}

/// Binary payload sent inline alongside the prompt text.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Declared media type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Original filename, if known. Never sent upstream.
    pub file_name: Option<String>,
}

impl Attachment {
    /// Create an attachment from raw bytes.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            file_name: None,
        }
    }

    /// Attach the original filename.
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// One content part of an upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Plain prompt text.
    Text(String),
    /// Inline binary with its media type.
    Inline(Attachment),
}

/// Everything the upstream call needs besides the model binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Composed system instruction.
    pub system_instruction: String,
    /// User content parts, text first.
    pub parts: Vec<Part>,
}

impl GenerateRequest {
    /// A request with a single text part.
    #[must_use]
    pub fn text(system_instruction: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Append inline attachments after the text.
    #[must_use]
    pub fn with_attachments(mut self, attachments: &[Attachment]) -> Self {
        self.parts
            .extend(attachments.iter().cloned().map(Part::Inline));
        self
    }
}

/// Desired register of the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Formal,
    Casual,
    Friendly,
    Professional,
}

/// Desired answer length class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLength {
    Short,
    Medium,
    Detailed,
}

/// Reader's familiarity with the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Expert,
}

macro_rules! snake_case_from_str {
    ($ty:ty, $($name:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(format!("unknown {}: '{s}'", stringify!($ty))),
                }
            }
        }
    };
}

snake_case_from_str!(Tone, "formal" => Tone::Formal, "casual" => Tone::Casual, "friendly" => Tone::Friendly, "professional" => Tone::Professional);
snake_case_from_str!(ResponseLength, "short" => ResponseLength::Short, "medium" => ResponseLength::Medium, "detailed" => ResponseLength::Detailed);
snake_case_from_str!(ExpertiseLevel, "beginner" => ExpertiseLevel::Beginner, "intermediate" => ExpertiseLevel::Intermediate, "expert" => ExpertiseLevel::Expert);

/// Per-call tuning supplied by the product layer. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub response_length: Option<ResponseLength>,
    /// Language the answer should be written in.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub expertise: Option<ExpertiseLevel>,
}

impl UserPreferences {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.response_length.is_none()
            && self.language.as_deref().is_none_or(|l| l.trim().is_empty())
            && self.expertise.is_none()
    }
}

/// Target style for [`Operation::ImproveWriting`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingStyle {
    Formal,
    Casual,
    Academic,
    #[default]
    Professional,
}

impl WritingStyle {
    /// Short phrase describing the style, interpolated into prompts.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Formal => "formal and courteous",
            Self::Casual => "friendly and natural",
            Self::Academic => "academic and rigorous",
            Self::Professional => "professional and clear",
        }
    }
}

snake_case_from_str!(WritingStyle, "formal" => WritingStyle::Formal, "casual" => WritingStyle::Casual, "academic" => WritingStyle::Academic, "professional" => WritingStyle::Professional);

/// A single logical "ask the AI to do X" call, consumed by
/// [`Gateway::dispatch`](crate::gateway::Gateway::dispatch).
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation: Operation,
    /// Primary text payload (the message for [`Operation::Chat`]).
    pub text: String,
    /// Context block from the user's selected notes. Chat only.
    pub context: Option<String>,
    /// Inline files. Chat only.
    pub attachments: Vec<Attachment>,
    pub preferences: Option<UserPreferences>,
    /// Summary length in words. Summarize only.
    pub max_length: Option<u32>,
    /// Rewrite style. Improve-writing only.
    pub style: Option<WritingStyle>,
    /// Translate only; required there.
    pub target_language: Option<String>,
}

impl OperationRequest {
    /// A request with only the operation and text set.
    #[must_use]
    pub fn new(operation: Operation, text: impl Into<String>) -> Self {
        Self {
            operation,
            text: text.into(),
            context: None,
            attachments: Vec::new(),
            preferences: None,
            max_length: None,
            style: None,
            target_language: None,
        }
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }
}
