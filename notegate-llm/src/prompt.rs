//! System instruction composition and per-operation prompt templates.
//!
//! The wording here is product content; the structure is not. Every system
//! instruction has the same four sections in the same order:
//!
//! 1. role line and task statement
//! 2. output formatting contract
//! 3. anti-fabrication contract
//! 4. preference tuning (only for fields the caller set)
//!
//! Built-in templates can be overridden per operation from a directory of
//! TOML files named after the operation (`summarize.toml`, ...).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GatewayError, Result};
use crate::types::{ExpertiseLevel, Operation, ResponseLength, Tone, UserPreferences};

/// Output formatting contract, section 2 of every instruction.
pub const FORMATTING_CONTRACT: &str = "Formatting: write in Markdown using only headings (## and ###), \
paragraphs, bulleted or numbered lists, **bold**, *italic* and inline `code`. \
Do not use tables, HTML, fenced code blocks, block quotes or horizontal rules. \
Never leave more than one blank line between blocks and do not start or end the answer with blank lines.";

/// Anti-fabrication contract, section 3 of every instruction.
pub const ACCURACY_CONTRACT: &str = "Accuracy: rely only on the material you were given and on well-established facts. \
If that information is not enough to answer, say so plainly instead of guessing. \
Never invent sources, numbers, quotes or details.";

const SECTION_BREAK: &str = "\n\n";

/// Build the system instruction for one call.
///
/// `compose(role, task, None)` is always a prefix of
/// `compose(role, task, Some(prefs))`: preferences only append.
#[must_use]
pub fn compose(role: &str, task: &str, prefs: Option<&UserPreferences>) -> String {
    let mut instruction = format!("You are {role}. {task}");
    instruction.push_str(SECTION_BREAK);
    instruction.push_str(FORMATTING_CONTRACT);
    instruction.push_str(SECTION_BREAK);
    instruction.push_str(ACCURACY_CONTRACT);

    let tuning = prefs.map(tuning_clauses).unwrap_or_default();
    if !tuning.is_empty() {
        instruction.push_str(SECTION_BREAK);
        instruction.push_str("Preferences:");
        for clause in tuning {
            instruction.push_str("\n- ");
            instruction.push_str(&clause);
        }
    }
    instruction
}

fn tuning_clauses(prefs: &UserPreferences) -> Vec<String> {
    let mut clauses = Vec::new();
    if let Some(tone) = prefs.tone {
        clauses.push(
            match tone {
                Tone::Formal => "Use a formal, courteous tone.",
                Tone::Casual => "Use a relaxed, conversational tone.",
                Tone::Friendly => "Use a warm, friendly tone.",
                Tone::Professional => "Use a professional, matter-of-fact tone.",
            }
            .to_string(),
        );
    }
    if let Some(length) = prefs.response_length {
        clauses.push(
            match length {
                ResponseLength::Short => "Keep the answer short: a few sentences or a brief list.",
                ResponseLength::Medium => "Keep the answer to a moderate length.",
                ResponseLength::Detailed => "Give a thorough, detailed answer.",
            }
            .to_string(),
        );
    }
    if let Some(level) = prefs.expertise {
        clauses.push(
            match level {
                ExpertiseLevel::Beginner => {
                    "Assume the reader is new to the subject and define any jargon."
                }
                ExpertiseLevel::Intermediate => {
                    "Assume the reader knows the basics; skip introductory definitions."
                }
                ExpertiseLevel::Expert => {
                    "Assume the reader is an expert; be precise and skip the basics."
                }
            }
            .to_string(),
        );
    }
    if let Some(language) = prefs.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        clauses.push(format!("Write the answer in {language}."));
    }
    clauses
}

/// Replace `{key}` placeholders in one pass.
///
/// Substituted values are never re-scanned, so caller text containing braces
/// is inserted verbatim. Unknown placeholders are left as-is.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Chat without note context.
pub const CHAT_USER: &str = "{message}";

pub const CHAT_WITH_CONTEXT_USER: &str = "Below is context from the notes the user selected:

{context}

---

Using that context, answer the user's question:

{message}";

pub const SUMMARIZE_USER: &str = "Summarize the following text in about {max_length} words.
Organize the summary into these sections:
## Overview
## Key points
## Notable facts
## Conclusion

Text:
{text}";

pub const CREATE_NOTE_USER: &str = "Turn the following text into a well-structured note.
Use this hierarchy:
## Goal
## Sections (one heading per topic, with sub-points)
## Key insights
## Action items

Text:
{text}";

pub const EXPLAIN_USER: &str = "Explain the following text in four parts:
## In simple terms
## An analogy
## How it works
## Why it matters

Text:
{text}";

pub const IMPROVE_WRITING_USER: &str = "Rewrite the following text so it reads {style}. \
Return only the full rewritten text, with no commentary, preamble or list of changes.

Text:
{text}";

pub const TRANSLATE_USER: &str = "Translate the following text into {language}. \
Preserve the original formatting, including headings, lists and line breaks. \
Leave code, product names and technical terms that have no accepted translation unchanged. \
Return only the translation.

Text:
{text}";

/// A ready-to-render prompt for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Version string, `builtin` for compiled-in templates.
    pub version: String,
    /// Persona, completes "You are ...".
    pub role: String,
    /// One-sentence task statement. May contain placeholders.
    pub task: String,
    /// User content template.
    pub user: String,
    /// Chat only: user template used when a context block is supplied.
    pub user_with_context: Option<String>,
    /// Returned when the upstream answers with empty text.
    pub fallback: String,
}

impl PromptTemplate {
    fn builtin(operation: Operation) -> Self {
        let (role, task, user, user_with_context, fallback) = match operation {
            Operation::Chat => (
                "a knowledgeable and helpful note-taking assistant",
                "Answer the user's question naturally and accurately, using the note context when it is provided.",
                CHAT_USER,
                Some(CHAT_WITH_CONTEXT_USER),
                "Sorry, I could not produce a response.",
            ),
            Operation::Summarize => (
                "an expert at summarizing documents",
                "Summarize texts concisely while keeping the most important information.",
                SUMMARIZE_USER,
                None,
                "The text could not be summarized.",
            ),
            Operation::CreateNote => (
                "a professional note-taking assistant",
                "Turn raw text into a clear, well-organized note that is easy to review.",
                CREATE_NOTE_USER,
                None,
                "A note could not be created from this text.",
            ),
            Operation::Explain => (
                "a patient and dedicated teacher",
                "Explain texts so that they are easy to understand, with examples where they help.",
                EXPLAIN_USER,
                None,
                "The text could not be explained.",
            ),
            Operation::ImproveWriting => (
                "an expert editor",
                "Improve the writing so it reads {style}, keeping the original meaning intact.",
                IMPROVE_WRITING_USER,
                None,
                "The text could not be improved.",
            ),
            Operation::Translate => (
                "a professional translator",
                "Translate texts accurately and naturally while preserving their meaning.",
                TRANSLATE_USER,
                None,
                "The text could not be translated.",
            ),
        };
        Self {
            version: "builtin".into(),
            role: role.into(),
            task: task.into(),
            user: user.into(),
            user_with_context: user_with_context.map(Into::into),
            fallback: fallback.into(),
        }
    }

    /// Render the system instruction.
    #[must_use]
    pub fn system(&self, vars: &[(&str, &str)], prefs: Option<&UserPreferences>) -> String {
        compose(&self.role, &render_template(&self.task, vars), prefs)
    }

    /// Render the user content, choosing the context variant when available.
    #[must_use]
    pub fn user(&self, vars: &[(&str, &str)], with_context: bool) -> String {
        let template = match (&self.user_with_context, with_context) {
            (Some(contextual), true) => contextual,
            _ => &self.user,
        };
        render_template(template, vars)
    }
}

/// Placeholders a user template must keep, or caller input would be dropped.
fn required_placeholders(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::Chat => &["{message}"],
        Operation::Summarize | Operation::CreateNote | Operation::Explain => &["{text}"],
        Operation::ImproveWriting => &["{text}", "{style}"],
        Operation::Translate => &["{text}", "{language}"],
    }
}

/// `[prompt]` table of an override file. Missing fields keep the built-in value.
#[derive(Debug, Deserialize)]
struct PromptFile {
    prompt: PromptOverride,
}

#[derive(Debug, Deserialize)]
struct PromptOverride {
    version: Option<String>,
    role: Option<String>,
    task: Option<String>,
    user: Option<String>,
    user_with_context: Option<String>,
    fallback: Option<String>,
}

/// Templates for all six operations.
#[derive(Debug, Clone)]
pub struct PromptSet {
    templates: HashMap<Operation, PromptTemplate>,
}

impl PromptSet {
    /// Compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let templates = Operation::all()
            .iter()
            .map(|op| (*op, PromptTemplate::builtin(*op)))
            .collect();
        Self { templates }
    }

    /// Built-ins overridden by `<operation>.toml` files in `dir`.
    ///
    /// # Errors
    /// Returns `GatewayError::Prompt` if the directory is missing, a file does
    /// not parse, or an override drops a required placeholder.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(GatewayError::Prompt(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }

        let mut set = Self::builtin();
        for op in Operation::all() {
            let path = dir.join(format!("{}.toml", op.label()));
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| {
                GatewayError::Prompt(format!("failed to read {}: {e}", path.display()))
            })?;
            let parsed: PromptFile = toml::from_str(&content).map_err(|e| {
                GatewayError::Prompt(format!("failed to parse {}: {e}", path.display()))
            })?;

            let tpl = set.templates.entry(*op).or_insert_with(|| PromptTemplate::builtin(*op));
            let o = parsed.prompt;
            if let Some(v) = o.version {
                tpl.version = v;
            }
            if let Some(v) = o.role {
                tpl.role = v;
            }
            if let Some(v) = o.task {
                tpl.task = v;
            }
            if let Some(v) = o.user {
                tpl.user = v;
            }
            if o.user_with_context.is_some() {
                tpl.user_with_context = o.user_with_context;
            }
            if let Some(v) = o.fallback {
                tpl.fallback = v;
            }

            for placeholder in required_placeholders(*op) {
                if !tpl.user.contains(placeholder) {
                    return Err(GatewayError::Prompt(format!(
                        "{}: user template must contain {placeholder}",
                        path.display()
                    )));
                }
            }
            if let Some(grounded) = &tpl.user_with_context {
                let required = required_placeholders(*op).iter().copied().chain(["{context}"]);
                for placeholder in required {
                    if !grounded.contains(placeholder) {
                        return Err(GatewayError::Prompt(format!(
                            "{}: user_with_context template must contain {placeholder}",
                            path.display()
                        )));
                    }
                }
            }
            tracing::debug!(operation = %op, version = %tpl.version, "loaded prompt override");
        }
        Ok(set)
    }

    /// Template for `operation`.
    #[must_use]
    pub fn get(&self, operation: Operation) -> &PromptTemplate {
        // Every constructor fills all six operations.
        &self.templates[&operation]
    }
}
