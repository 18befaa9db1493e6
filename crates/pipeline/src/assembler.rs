//! Prompt assembly.
//!
//! Turns a document store snapshot and a question into the single prompt
//! sent to the completion provider. Assembly is a pure function of its
//! inputs: the report date comes from the snapshot, not the wall clock.

use itzai_config::{AppConfig, DEFAULT_CHAR_BUDGET};
use itzai_core::document::{Document, DocumentSlot};
use itzai_core::error::AssemblyError;
use serde::Serialize;

use crate::store::DocumentStoreView;

const QUESTION_LABEL: &str = "QUESTION";

/// One labeled block of the assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptSection {
    pub label: String,
    pub body: String,
}

/// The question together with the documents that ground it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub question: String,
    pub documents_used: Vec<Document>,
}

impl QueryRequest {
    pub fn slots_used(&self) -> Vec<DocumentSlot> {
        self.documents_used.iter().map(|d| d.slot).collect()
    }
}

/// A fully composed prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// The exact text handed to the provider.
    pub text: String,
    /// Document and question sections, in prompt order.
    pub sections: Vec<PromptSection>,
    pub request: QueryRequest,
}

impl AssembledPrompt {
    pub fn section(&self, label: &str) -> Option<&PromptSection> {
        self.sections.iter().find(|s| s.label == label)
    }
}

/// Builds grounded prompts from loaded documents.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    char_budget: usize,
    assistant_name: String,
    query_preview_chars: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            char_budget: DEFAULT_CHAR_BUDGET,
            assistant_name: "ItzAI".into(),
            query_preview_chars: 100,
        }
    }
}

impl PromptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            char_budget: config.documents.char_budget,
            assistant_name: config.prompt.assistant_name.clone(),
            query_preview_chars: config.prompt.query_preview_chars,
        }
    }

    /// Per-document budget in characters.
    pub fn with_char_budget(mut self, budget: usize) -> Self {
        self.char_budget = budget;
        self
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn with_query_preview_chars(mut self, chars: usize) -> Self {
        self.query_preview_chars = chars;
        self
    }

    pub fn char_budget(&self) -> usize {
        self.char_budget
    }

    /// Compose the prompt for `question` from `view`.
    ///
    /// Fails with `NoDocuments` when no clinical history is present. The
    /// protocol is included only when it is loaded and toggled on. Each
    /// document is cut independently to the character budget.
    pub fn assemble(
        &self,
        view: &DocumentStoreView,
        question: &str,
    ) -> Result<AssembledPrompt, AssemblyError> {
        let primary = view.primary.as_ref().ok_or(AssemblyError::NoDocuments)?;
        let supplementary = view.effective_supplementary();

        let mut documents_used = vec![primary.clone()];
        let mut sections = vec![self.document_section(primary)];
        if let Some(doc) = supplementary {
            documents_used.push(doc.clone());
            sections.push(self.document_section(doc));
        }
        sections.push(PromptSection {
            label: QUESTION_LABEL.into(),
            body: question.to_string(),
        });

        let mut text = self.instructions(view, question, supplementary.is_some());
        for section in &sections {
            text.push_str("\n=== ");
            text.push_str(&section.label);
            text.push_str(" ===\n");
            text.push_str(&section.body);
            text.push('\n');
        }

        Ok(AssembledPrompt {
            text,
            sections,
            request: QueryRequest {
                question: question.to_string(),
                documents_used,
            },
        })
    }

    fn document_section(&self, doc: &Document) -> PromptSection {
        PromptSection {
            label: doc.slot.label().into(),
            body: truncate_chars(&doc.raw_text, self.char_budget).to_string(),
        }
    }

    fn instructions(
        &self,
        view: &DocumentStoreView,
        question: &str,
        with_protocol: bool,
    ) -> String {
        let grounding = if with_protocol {
            "You are an expert physician analyzing a clinical record. Answer the question \
             using EXCLUSIVELY the CLINICAL HISTORY and TREATMENT PROTOCOL sections below. \
             Integrate both coherently: relate the patient's findings to the protocol's \
             guidance and point out where they agree or conflict."
        } else {
            "You are an expert physician analyzing a clinical record. Answer the question \
             using EXCLUSIVELY the information in the CLINICAL HISTORY section below."
        };

        let preview = truncate_chars(question, self.query_preview_chars);
        let ellipsis = if preview.len() < question.len() { "..." } else { "" };

        format!(
            "{grounding}\n\
             If the documents do not contain the answer, say so instead of guessing.\n\
             \n\
             Required answer format:\n\
             \n\
             **RECORD | {name}**\n\
             **Date**: {date}\n\
             **Query**: {preview}{ellipsis}\n\
             \n\
             **Clinical Findings**:\n\
             - [Detailed analysis of the relevant findings]\n\
             \n\
             **Neurological Assessment**:\n\
             - [Interpretation of the neurological data]\n\
             \n\
             **Recommendations**:\n\
             - [Evidence-based suggestions]\n\
             \n\
             **Applicable Technologies**:\n\
             - [Possible complementary studies: EEG, PSG, BCI, etc.]\n",
            name = self.assistant_name,
            date = view.captured_at.format("%d/%m/%Y %H:%M UTC"),
        )
    }
}

/// The first `budget` characters of `text` (Unicode scalar values, not bytes).
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
