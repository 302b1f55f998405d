//! Reading prompt text and attachments from the command line.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use notegate_llm::Attachment;

/// Media types accepted as attachments, keyed by lowercase file extension.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

/// Media type for `path`, or `None` if the extension is not accepted.
pub fn media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// Load a file as an inline attachment.
pub fn load_attachment(path: &Path) -> Result<Attachment> {
    let Some(mime) = media_type(path) else {
        bail!(
            "unsupported attachment type: {} (accepted: jpeg, png, gif, webp, pdf, txt, md, docx, xlsx)",
            path.display()
        );
    };
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let attachment = Attachment::new(mime, data);
    Ok(match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => attachment.with_file_name(name),
        None => attachment,
    })
}

/// Read a context block from a file.
pub fn load_context(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// The positional text, or all of stdin when it is absent or `-`.
pub fn read_text(arg: Option<String>) -> Result<String> {
    match arg {
        Some(text) if text != "-" => Ok(text),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read text from stdin")?;
            Ok(buf)
        }
    }
}
