//! Document domain types.
//!
//! A session holds at most two documents: the patient's clinical history
//! (primary, always required) and an optional treatment protocol
//! (supplementary). A `Document` only exists once its text was extracted
//! successfully and is non-empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which of the two document slots a document occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSlot {
    /// The clinical history record that grounds every answer.
    Primary,
    /// The treatment protocol, included only when toggled on.
    Supplementary,
}

impl DocumentSlot {
    /// Section heading used for this slot inside an assembled prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "CLINICAL HISTORY",
            Self::Supplementary => "TREATMENT PROTOCOL",
        }
    }
}

impl std::fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "history"),
            Self::Supplementary => write!(f, "protocol"),
        }
    }
}

impl std::str::FromStr for DocumentSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "history" | "hc" | "primary" => Ok(Self::Primary),
            "protocol" | "supplementary" => Ok(Self::Supplementary),
            other => Err(format!(
                "unknown document slot '{other}' (expected 'history' or 'protocol')"
            )),
        }
    }
}

/// Where a document's bytes come from.
#[derive(Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An in-memory upload.
    Upload { name: String, bytes: Vec<u8> },
}

impl DocumentSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn upload(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Upload {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Human-readable identifier (path or `upload:<name>`).
    pub fn descriptor(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Upload { name, .. } => format!("upload:{name}"),
        }
    }
}

// Uploads can be megabytes; never dump the bytes.
impl std::fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Upload { name, bytes } => f
                .debug_struct("Upload")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// A loaded document with its full extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The slot this document occupies
    pub slot: DocumentSlot,

    /// Extracted plain text (never empty)
    pub raw_text: String,

    /// Path or upload identifier the text came from
    pub source_descriptor: String,

    /// When the document was loaded
    pub loaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        slot: DocumentSlot,
        raw_text: impl Into<String>,
        source_descriptor: impl Into<String>,
    ) -> Self {
        Self {
            slot,
            raw_text: raw_text.into(),
            source_descriptor: source_descriptor.into(),
            loaded_at: Utc::now(),
        }
    }

    /// Length of the text in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.raw_text.chars().count()
    }
}
